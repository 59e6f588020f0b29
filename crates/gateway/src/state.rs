use inference::InferenceInvoker;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub invoker: Arc<InferenceInvoker>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(invoker: InferenceInvoker, max_upload_bytes: usize) -> Self {
        Self {
            invoker: Arc::new(invoker),
            max_upload_bytes,
        }
    }
}
