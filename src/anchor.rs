use crate::grid::{AnchorError, AnchorId, Coordinate, GridSurface, SurfaceError};

/// A grid position that keeps pointing at the same content while the text
/// around it is edited. Thin wrapper over the surface's own tracking.
#[derive(Debug)]
pub struct AnchoredPosition {
    id: AnchorId,
    released: bool,
}

impl AnchoredPosition {
    pub fn new(surface: &mut dyn GridSurface, at: Coordinate) -> Result<Self, SurfaceError> {
        let id = surface.create_anchor(at)?;
        Ok(Self {
            id,
            released: false,
        })
    }

    /// Where the tracked content is now.
    pub fn current_coordinate(&self, surface: &dyn GridSurface) -> Result<Coordinate, AnchorError> {
        if self.released {
            return Err(AnchorError::Unknown(self.id));
        }
        surface.dereference(self.id)
    }

    pub fn release(&mut self, surface: &mut dyn GridSurface) {
        if !self.released {
            surface.release(self.id);
            self.released = true;
        }
    }
}
