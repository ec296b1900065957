//! Layered raster compositing for an image masking editor: a base image, a
//! painted mask, a replacement image and the derived output.

pub mod codec;
pub mod compositor;
pub mod config;
pub mod error;
pub mod layers;
pub mod session;
pub mod status;
pub mod stroke;
pub mod surface;

pub use error::{EditorError, Prerequisite, Result};
pub use layers::{CanvasGeometry, CompositionMode, LayerSet, Viewport};
pub use session::{EditingSession, SessionOptions};
pub use surface::{Point, RasterSurface};
