/// User-initiated navigation, sent from the widget handle to the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselCommand {
    Next,
    Prev,
}

/// Emitted by the hosting surface when the visual slide transition finishes.
/// One signal is expected per started move.
#[derive(Debug)]
pub struct TransitionEnded;
