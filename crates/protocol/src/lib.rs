pub mod envelope;
pub mod recording;
pub mod viz;
pub mod widgets;

pub use envelope::{DecodeError, Frame, VIZ_UPDATE_KEY, WsMessage, decode_text};
pub use recording::{Recording, RecordingError};
pub use viz::Viz;
pub use widgets::{PlotScalarData, ThreeDPrimitive, ThreeDViewData, Widget};
