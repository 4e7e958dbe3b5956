//! Entities the world streams chunks around.

use std::sync::{PoisonError, RwLock};

use cgmath::Point3;

/// Anything with a position in the world: a camera, a player, a scripted probe.
///
/// The world only keeps weak references to its observers, so dropping the last strong
/// reference is enough to stop streaming around it.
pub trait Observer: Send + Sync {
    fn position(&self) -> Point3<f32>;
}

/// An observer whose position is set from the outside.
#[derive(Debug)]
pub struct TrackedPosition {
    position: RwLock<Point3<f32>>,
}

impl TrackedPosition {
    pub fn new(position: Point3<f32>) -> Self {
        TrackedPosition {
            position: RwLock::new(position),
        }
    }

    pub fn set_position(&self, position: Point3<f32>) {
        *self.position.write().unwrap_or_else(PoisonError::into_inner) = position;
    }
}

impl Observer for TrackedPosition {
    fn position(&self) -> Point3<f32> {
        *self.position.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_position_follows_updates() {
        let observer = TrackedPosition::new(Point3::new(0.0, 0.0, 0.0));
        observer.set_position(Point3::new(1.5, -2.0, 40.0));
        assert_eq!(observer.position(), Point3::new(1.5, -2.0, 40.0));
    }
}
