use crate::{
    error::{BaseClipFrame, ClipStackOverflow},
    transform::TransformStack,
    IRect, Region,
};

/// One entry of the clip stack, in device space.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipFrame {
    /// The whole surface is drawable.
    Unclipped,
    /// Only the pixels of the region are drawable. May be empty.
    Region(Region),
}

impl ClipFrame {
    pub fn region(&self) -> Option<&Region> {
        match self {
            ClipFrame::Unclipped => None,
            ClipFrame::Region(region) => Some(region),
        }
    }
}

/// How a rectangle relates to the current clip.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClipBox {
    /// Nothing of the rectangle is drawable.
    Disjoint,
    /// The whole rectangle is drawable; no clipping is needed.
    Inside,
    /// Only the returned part, in logical coordinates, is drawable.
    Partial(IRect),
}

impl ClipBox {
    /// The drawable bounds of `query`: unchanged when inside,
    /// zero-sized when disjoint.
    pub fn bounds(self, query: IRect) -> IRect {
        match self {
            ClipBox::Disjoint => IRect::new(query.x, query.y, 0, 0),
            ClipBox::Inside => query,
            ClipBox::Partial(bounds) => bounds,
        }
    }
}

/// The stack of clip frames.
///
/// The base frame is [`ClipFrame::Unclipped`] and is never popped.
/// Rectangles are given in logical coordinates and converted through
/// the transform stack; frames are stored in device space.
#[derive(Debug, Clone)]
pub struct ClipStack {
    frames: Vec<ClipFrame>,
    max_depth: usize,
    state_number: u64,
}

impl ClipStack {
    /// Creates a stack holding at most `max_depth` frames,
    /// the base frame included.
    pub fn new(max_depth: usize) -> Self {
        let mut frames = Vec::with_capacity(max_depth.min(64));
        frames.push(ClipFrame::Unclipped);
        Self {
            frames,
            max_depth: max_depth.max(1),
            state_number: 0,
        }
    }

    pub fn current(&self) -> &ClipFrame {
        // the base frame is never popped
        &self.frames[self.frames.len() - 1]
    }

    /// The current clip region; `None` when unclipped.
    pub fn region(&self) -> Option<&Region> {
        self.current().region()
    }

    /// Number of frames, the base frame included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Incremented by every change of the current clip.
    pub fn state_number(&self) -> u64 {
        self.state_number
    }

    /// Intersects the current clip with a logical rectangle and pushes
    /// the result. A rectangle with a non-positive side pushes the
    /// empty region.
    pub fn push_clip(
        &mut self,
        transform: &TransformStack,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
    ) -> Result<(), ClipStackOverflow> {
        let region = if w > 0 && h > 0 {
            let rect = transform.device_rect(x, y, w, h);
            match self.current() {
                ClipFrame::Unclipped => Region::from_rect(rect),
                ClipFrame::Region(current) => current.intersect_rect(&rect),
            }
        } else {
            Region::empty()
        };
        self.push(ClipFrame::Region(region))
    }

    /// Pushes a frame that disables clipping until the matching pop.
    pub fn push_no_clip(&mut self) -> Result<(), ClipStackOverflow> {
        self.push(ClipFrame::Unclipped)
    }

    /// Discards the top frame. Returns `false` at the base frame,
    /// which is left in place.
    pub fn pop_clip(&mut self) -> bool {
        if self.frames.len() == 1 {
            return false;
        }
        self.frames.pop();
        self.state_number += 1;
        true
    }

    /// Replaces the top frame with a device-space region, or with
    /// no clipping for `None`. The base frame accepts only `None`.
    pub fn set_region(&mut self, region: Option<Region>) -> Result<(), BaseClipFrame> {
        let frame = match region {
            Some(_) if self.frames.len() == 1 => return Err(BaseClipFrame),
            Some(region) => ClipFrame::Region(region),
            None => ClipFrame::Unclipped,
        };
        let top = self.frames.len() - 1;
        self.frames[top] = frame;
        self.state_number += 1;
        Ok(())
    }

    /// Pops every frame above the base.
    pub fn reset(&mut self) {
        self.frames.truncate(1);
        self.state_number += 1;
    }

    /// Classifies a logical rectangle against the current clip.
    pub fn clip_box(&self, transform: &TransformStack, x: i32, y: i32, w: i32, h: i32) -> ClipBox {
        let region = match self.current() {
            ClipFrame::Unclipped => return ClipBox::Inside,
            ClipFrame::Region(region) => region,
        };
        if w <= 0 || h <= 0 {
            return ClipBox::Disjoint;
        }
        let rect = transform.device_rect(x, y, w, h);
        let visible = region.intersect_rect(&rect);
        if visible.is_empty() {
            ClipBox::Disjoint
        } else if visible.area() == rect.area() {
            // `visible` is a subset of `rect`
            ClipBox::Inside
        } else {
            ClipBox::Partial(transform.logical_rect(visible.bounding_box()))
        }
    }

    /// Returns whether any part of a logical rectangle may be drawn.
    pub fn not_clipped(&self, transform: &TransformStack, x: i32, y: i32, w: i32, h: i32) -> bool {
        if w <= 0 || h <= 0 {
            return false;
        }
        self.not_clipped_device(&transform.device_rect(x, y, w, h))
    }

    /// [`not_clipped`](Self::not_clipped) for a device rectangle.
    pub fn not_clipped_device(&self, rect: &IRect) -> bool {
        if rect.right() <= 0 || rect.bottom() <= 0 {
            return false;
        }
        match self.current() {
            ClipFrame::Unclipped => true,
            ClipFrame::Region(region) => {
                region.bounding_box().intersects(rect) && region.intersects_rect(rect)
            }
        }
    }

    fn push(&mut self, frame: ClipFrame) -> Result<(), ClipStackOverflow> {
        if self.frames.len() >= self.max_depth {
            return Err(ClipStackOverflow {
                max_depth: self.max_depth,
            });
        }
        self.frames.push(frame);
        self.state_number += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::vec2;

    use super::*;
    use crate::{config::SurfaceKind, transform::TransformState, SnapPolicy};

    fn identity() -> TransformStack {
        TransformStack::new(TransformState::default(), SnapPolicy::PixelSnap)
    }

    fn random_rect(rng: &fastrand::Rng, within: IRect) -> IRect {
        let x = rng.i32(within.x..within.right());
        let y = rng.i32(within.y..within.bottom());
        let w = rng.i32(1..=within.right() - x);
        let h = rng.i32(1..=within.bottom() - y);
        IRect::new(x, y, w, h)
    }

    #[test]
    fn nested_pushes_intersect() {
        let t = identity();
        let mut clip = ClipStack::new(10);
        assert_eq!(clip.depth(), 1);
        clip.push_clip(&t, 10, 10, 50, 50).unwrap();
        clip.push_clip(&t, 20, 20, 10, 10).unwrap();
        assert_eq!(
            clip.clip_box(&t, 0, 0, 100, 100),
            ClipBox::Partial(IRect::new(20, 20, 10, 10))
        );
    }

    #[test]
    fn rects_inside_clip_are_inside() {
        let t = identity();
        let rng = fastrand::Rng::with_seed(7);
        let mut clip = ClipStack::new(10);
        let area = IRect::new(-40, 15, 300, 120);
        clip.push_clip(&t, area.x, area.y, area.w, area.h).unwrap();
        for _ in 0..500 {
            let r = random_rect(&rng, area);
            let result = clip.clip_box(&t, r.x, r.y, r.w, r.h);
            assert_eq!(result, ClipBox::Inside, "{:?}", r);
            assert_eq!(result.bounds(r), r);
            assert!(clip.not_clipped(&t, r.x, r.y, r.w, r.h) || r.right() <= 0);
        }
    }

    #[test]
    fn rects_outside_clip_are_disjoint() {
        let t = identity();
        let rng = fastrand::Rng::with_seed(11);
        let mut clip = ClipStack::new(10);
        clip.push_clip(&t, 100, 100, 50, 50).unwrap();
        for _ in 0..500 {
            let r = random_rect(&rng, IRect::new(0, 0, 100, 400));
            let result = clip.clip_box(&t, r.x, r.y, r.w, r.h);
            assert_eq!(result, ClipBox::Disjoint, "{:?}", r);
            assert_eq!(result.bounds(r).w, 0);
            assert_eq!(result.bounds(r).h, 0);
            assert!(!clip.not_clipped(&t, r.x, r.y, r.w, r.h));
        }
    }

    #[test]
    fn push_pop_round_trip() {
        let t = identity();
        let rng = fastrand::Rng::with_seed(3);
        let mut clip = ClipStack::new(10);
        clip.push_clip(&t, 0, 0, 64, 64).unwrap();
        let queries: Vec<IRect> = (0..200)
            .map(|_| random_rect(&rng, IRect::new(-50, -50, 200, 200)))
            .collect();
        let before: Vec<ClipBox> = queries
            .iter()
            .map(|r| clip.clip_box(&t, r.x, r.y, r.w, r.h))
            .collect();

        clip.push_clip(&t, 10, 10, 5, 5).unwrap();
        assert!(clip.pop_clip());
        clip.push_no_clip().unwrap();
        assert!(clip.pop_clip());

        let after: Vec<ClipBox> = queries
            .iter()
            .map(|r| clip.clip_box(&t, r.x, r.y, r.w, r.h))
            .collect();
        assert_eq!(before, after);
        assert_eq!(clip.depth(), 2);
    }

    #[test]
    fn empty_push_hides_everything() {
        let t = identity();
        let mut clip = ClipStack::new(10);
        clip.push_clip(&t, 5, 5, 0, 20).unwrap();
        assert_eq!(clip.clip_box(&t, 0, 0, 100, 100), ClipBox::Disjoint);
        assert!(!clip.not_clipped(&t, 0, 0, 100, 100));
        clip.push_no_clip().unwrap();
        assert_eq!(clip.clip_box(&t, 0, 0, 100, 100), ClipBox::Inside);
        clip.pop_clip();
        assert!(!clip.not_clipped(&t, 0, 0, 100, 100));
    }

    #[test]
    fn pop_at_base_is_noop() {
        let mut clip = ClipStack::new(10);
        assert!(!clip.pop_clip());
        assert!(!clip.pop_clip());
        assert_eq!(clip.depth(), 1);
        assert_eq!(clip.current(), &ClipFrame::Unclipped);
    }

    #[test]
    fn overflow_drops_push() {
        let t = identity();
        let mut clip = ClipStack::new(10);
        let mut dropped = 0;
        for i in 0..1000 {
            if clip.push_clip(&t, i % 7, 0, 100, 100).is_err() {
                dropped += 1;
            }
        }
        assert_eq!(clip.depth(), 10);
        assert_eq!(dropped, 1000 - 9);
        // the last accepted frame stays current
        assert_eq!(
            clip.clip_box(&t, 0, 0, 200, 200),
            ClipBox::Partial(IRect::new(6, 0, 94, 100))
        );
    }

    #[test]
    fn composite_regions_use_region_geometry() {
        let t = identity();
        let mut clip = ClipStack::new(10);
        let mut l_shape = Region::from_xywh(0, 0, 100, 10);
        l_shape.union_rect(IRect::new(0, 0, 10, 100));
        clip.push_no_clip().unwrap();
        clip.set_region(Some(l_shape)).unwrap();

        // inside the bounding box but outside both bars
        assert_eq!(clip.clip_box(&t, 50, 50, 10, 10), ClipBox::Disjoint);
        assert!(!clip.not_clipped(&t, 50, 50, 10, 10));
        assert_eq!(clip.clip_box(&t, 0, 0, 20, 10), ClipBox::Inside);
        // spans both stored rectangles
        assert_eq!(clip.clip_box(&t, 0, 5, 10, 20), ClipBox::Inside);
        assert_eq!(
            clip.clip_box(&t, 5, 5, 10, 10),
            ClipBox::Partial(IRect::new(5, 5, 10, 10))
        );

        clip.push_clip(&t, 5, 5, 100, 100).unwrap();
        assert_eq!(clip.region().map(Region::area), Some(95 * 5 + 5 * 90));
    }

    #[test]
    fn base_frame_rejects_regions() {
        let mut clip = ClipStack::new(10);
        assert!(clip.set_region(Some(Region::from_xywh(0, 0, 5, 5))).is_err());
        assert!(clip.set_region(None).is_ok());
        assert_eq!(clip.current(), &ClipFrame::Unclipped);
    }

    #[test]
    fn state_number_tracks_changes() {
        let t = identity();
        let mut clip = ClipStack::new(3);
        let start = clip.state_number();
        clip.push_clip(&t, 0, 0, 1, 1).unwrap();
        clip.push_no_clip().unwrap();
        assert!(clip.push_no_clip().is_err());
        clip.pop_clip();
        clip.pop_clip();
        clip.pop_clip();
        assert_eq!(clip.state_number(), start + 4);
    }

    #[test]
    fn print_surface_converts_coordinates() {
        let surface = SurfaceKind::Print {
            scale_x: 2.,
            scale_y: 2.,
            angle: 0.,
            left_margin: 100.,
            top_margin: 50.,
        };
        let t = TransformStack::new(surface.base_transform(), SnapPolicy::PixelSnap);
        assert_eq!(t.apply(0., 0.), vec2(100., 50.));

        let mut clip = ClipStack::new(10);
        clip.push_clip(&t, 10, 10, 50, 50).unwrap();
        // stored in device space
        assert_eq!(
            clip.region().map(Region::bounding_box),
            Some(IRect::new(120, 70, 100, 100))
        );
        // queried and reported in logical space
        assert_eq!(clip.clip_box(&t, 20, 20, 10, 10), ClipBox::Inside);
        assert_eq!(
            clip.clip_box(&t, 0, 0, 30, 30),
            ClipBox::Partial(IRect::new(10, 10, 20, 20))
        );
        assert_eq!(clip.clip_box(&t, 70, 0, 10, 10), ClipBox::Disjoint);
        assert!(clip.not_clipped(&t, 55, 55, 10, 10));
    }

    #[test]
    fn display_surface_conversion_is_identity() {
        let t = TransformStack::new(SurfaceKind::default().base_transform(), SnapPolicy::SubPixel);
        let mut clip = ClipStack::new(10);
        clip.push_clip(&t, 10, 10, 50, 50).unwrap();
        assert_eq!(
            clip.region().map(Region::bounding_box),
            Some(IRect::new(10, 10, 50, 50))
        );
        assert_eq!(
            clip.clip_box(&t, 0, 0, 30, 30),
            ClipBox::Partial(IRect::new(10, 10, 20, 20))
        );
    }
}
