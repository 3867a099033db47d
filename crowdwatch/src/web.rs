mod dashboard;
mod server;

pub use dashboard::{Dashboard, RenderMode};
pub use server::{WebControls, WebUi, WebUiConfig};
