//! jgd-test-utils: shared mock clients for the broker's end-to-end test
//! suite. A [`MockProducer`] speaks raw NDJSON over TCP the way a plotting
//! process would; a [`MockViewer`] speaks the `/ws` WebSocket protocol the
//! way the browser UI would.

pub mod mock_producer;
pub mod mock_viewer;

pub use mock_producer::MockProducer;
pub use mock_viewer::MockViewer;
