pub use apikit_test_support::*;

use apikit_core::prelude::*;
use std::sync::Mutex;

#[allow(unused)]
pub fn adapter(transport: MockTransport) -> ApiAdapter<MockTransport> {
    let base = url::Url::parse(apikit_examples::HTTPBIN).unwrap();
    ApiAdapter::with_transport(base, transport)
}

/// Records every running-request count it is told about.
#[allow(unused)]
#[derive(Default)]
pub struct CountRecorder {
    counts: Mutex<Vec<u64>>,
}

#[allow(unused)]
impl CountRecorder {
    pub fn counts(&self) -> Vec<u64> {
        self.counts.lock().unwrap().clone()
    }
}

impl AdapterDelegate for CountRecorder {
    fn did_update_running_request_count(&self, count: u64) {
        self.counts.lock().unwrap().push(count);
    }
}
