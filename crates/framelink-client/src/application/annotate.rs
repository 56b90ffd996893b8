//! Pairs decoded detections with the depth measured at their centres.

use framelink_core::Detection;

use crate::application::device::FrameSource;
use crate::domain::Annotation;

/// Looks up the depth at the centre of each detection's box.
///
/// Detections keep their order.  A centre outside the depth map, or a point
/// without valid depth, yields an annotation with no distance.
pub fn annotate_detections<F>(source: &F, detections: &[Detection]) -> Vec<Annotation>
where
    F: FrameSource + ?Sized,
{
    detections
        .iter()
        .map(|detection| {
            let (x, y) = detection.bbox.center();
            let distance = source.lookup_point(x, y).and_then(|p| p.distance_m());
            Annotation::new(*detection, distance)
        })
        .collect()
}
