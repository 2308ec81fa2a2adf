//! Mock engine collaborator for unit tests.
//!
//! Implements [`EngineApi`] over an in-memory workspace so session,
//! variable, and call behavior can be exercised without a native engine
//! library. Statement handling is deliberately tiny: `clear <name>;`
//! removes a workspace entry, and an assignment statement defines its
//! left-hand-side names, which is all the orchestration layer observes.

use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::ffi::EngineApi;
use crate::variables::MxArray;

#[derive(Default)]
struct MockState {
    workspace: HashMap<String, usize>,
    statements: Vec<String>,
    open_calls: usize,
    close_calls: usize,
    /// Latest registered buffer as (pointer, capacity).
    buffer: Option<(usize, usize)>,
    refuse_open: bool,
    fail_next_eval: bool,
    reject_put: Option<String>,
    suppress_assignments: bool,
    pending_output: Option<Vec<u8>>,
}

pub(crate) struct MockEngine {
    state: Mutex<MockState>,
    next_token: AtomicUsize,
}

impl MockEngine {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            next_token: AtomicUsize::new(1),
        }
    }

    fn token(&self) -> usize {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    /// A fresh fake array handle, as the marshaling layer would produce.
    pub(crate) fn new_array(&self) -> MxArray {
        // SAFETY: mock handles are opaque tokens; nothing dereferences them.
        unsafe { MxArray::from_raw(self.token() as *mut c_void) }.expect("token is nonzero")
    }

    pub(crate) fn refuse_open(&self) {
        self.state.lock().unwrap().refuse_open = true;
    }

    pub(crate) fn fail_next_eval(&self) {
        self.state.lock().unwrap().fail_next_eval = true;
    }

    pub(crate) fn reject_put(&self, name: &str) {
        self.state.lock().unwrap().reject_put = Some(name.to_string());
    }

    /// Make assignment statements define nothing, as when the remote
    /// function errors and the call produces only printed output.
    pub(crate) fn suppress_assignments(&self) {
        self.state.lock().unwrap().suppress_assignments = true;
    }

    /// Write `text` into the registered capture buffer during the next
    /// eval, as the engine does for printed output.
    pub(crate) fn print_on_next_eval(&self, text: &str) {
        self.state.lock().unwrap().pending_output = Some(text.as_bytes().to_vec());
    }

    pub(crate) fn open_calls(&self) -> usize {
        self.state.lock().unwrap().open_calls
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.state.lock().unwrap().close_calls
    }

    pub(crate) fn registered_buffer(&self) -> Option<(usize, usize)> {
        self.state.lock().unwrap().buffer
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }

    pub(crate) fn workspace_contains(&self, name: &str) -> bool {
        self.state.lock().unwrap().workspace.contains_key(name)
    }

    pub(crate) fn workspace_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().unwrap().workspace.keys().cloned().collect();
        names.sort();
        names
    }
}

impl EngineApi for MockEngine {
    fn open(&self, _start_command: Option<&CStr>) -> *mut c_void {
        let mut state = self.state.lock().unwrap();
        state.open_calls += 1;
        if state.refuse_open {
            return ptr::null_mut();
        }
        self.token() as *mut c_void
    }

    fn close(&self, _handle: *mut c_void) -> c_int {
        self.state.lock().unwrap().close_calls += 1;
        0
    }

    fn register_output_buffer(
        &self,
        _handle: *mut c_void,
        buffer: *mut c_char,
        capacity: c_int,
    ) -> c_int {
        self.state.lock().unwrap().buffer = Some((buffer as usize, capacity as usize));
        0
    }

    fn eval(&self, _handle: *mut c_void, statement: &CStr) -> c_int {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_eval {
            state.fail_next_eval = false;
            return 1;
        }

        let statement = statement.to_string_lossy().into_owned();
        state.statements.push(statement.clone());

        if let Some(name) = statement.strip_prefix("clear ").and_then(|s| s.strip_suffix(';')) {
            state.workspace.remove(name);
        } else if let Some((lhs, _rhs)) = statement.split_once(" = ") {
            if !state.suppress_assignments {
                let lhs = lhs.trim_start_matches('[').trim_end_matches(']');
                for name in lhs.split(", ") {
                    let token = self.token();
                    state.workspace.insert(name.to_string(), token);
                }
            }
        }

        self.write_pending_output(&mut state);
        0
    }

    fn put_variable(&self, _handle: *mut c_void, name: &CStr, value: *const c_void) -> c_int {
        let name = name.to_string_lossy().into_owned();
        let mut state = self.state.lock().unwrap();
        if state.reject_put.as_deref() == Some(name.as_str()) {
            return 1;
        }
        state.workspace.insert(name, value as usize);
        0
    }

    fn get_variable(&self, _handle: *mut c_void, name: &CStr) -> *mut c_void {
        let name = name.to_string_lossy();
        let state = self.state.lock().unwrap();
        match state.workspace.get(name.as_ref()) {
            Some(&token) => token as *mut c_void,
            None => ptr::null_mut(),
        }
    }

    fn set_visible(&self, _handle: *mut c_void, _visible: bool) -> c_int {
        0
    }
}

impl MockEngine {
    fn write_pending_output(&self, state: &mut MockState) {
        let Some(bytes) = state.pending_output.take() else {
            return;
        };
        let Some((pointer, capacity)) = state.buffer else {
            return;
        };
        if pointer == 0 || capacity == 0 {
            return;
        }
        let len = bytes.len().min(capacity - 1);
        // SAFETY: the buffer was registered by a live session and stays
        // alive for the duration of this eval call.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), pointer as *mut u8, len);
            *(pointer as *mut u8).add(len) = 0;
        }
    }
}
