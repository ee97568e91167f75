/// Capability handle for one visual placeholder (a slide slot or a
/// thumbnail). Constructed once by the hosting UI builder and handed to the
/// carousel by reference; the carousel never creates or destroys surfaces.
pub trait Surface: Send {
    fn set_image(&mut self, url: &str);
    fn show(&mut self);
    fn hide(&mut self);
}

/// Capability handle for the caption area under the current slide.
pub trait CaptionPanel: Send {
    fn set_title(&mut self, title: &str);
    fn show(&mut self);
    fn hide(&mut self);
}

/// Direction of a slide move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// The three logical slide roles mapped onto three fixed surfaces.
///
/// Roles rotate on each move rather than slots being recreated: moving
/// forward relabels current→previous, next→current, and recycles the old
/// previous slot as the new next.
pub struct SlideTrio {
    pub previous: Box<dyn Surface>,
    pub current: Box<dyn Surface>,
    pub next: Box<dyn Surface>,
}

impl SlideTrio {
    pub fn rotate(&mut self, direction: Direction) {
        match direction {
            Direction::Forward => {
                // previous=old current, current=old next, next=old previous
                std::mem::swap(&mut self.previous, &mut self.current);
                std::mem::swap(&mut self.current, &mut self.next);
            }
            Direction::Backward => {
                // previous=old next, current=old previous, next=old current
                std::mem::swap(&mut self.previous, &mut self.next);
                std::mem::swap(&mut self.next, &mut self.current);
            }
        }
    }
}

/// Pair of navigation thumbnails flanking the current slide.
pub struct ThumbnailPair {
    pub previous: Box<dyn Surface>,
    pub next: Box<dyn Surface>,
}

/// Everything the external UI builder constructs for one carousel instance.
pub struct CarouselSurfaces {
    pub slides: SlideTrio,
    pub thumbnails: ThumbnailPair,
    pub caption: Box<dyn CaptionPanel>,
}
