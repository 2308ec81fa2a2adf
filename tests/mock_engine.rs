//! Full bridge flow over the public [`EngineApi`] seam.
//!
//! These tests stand in a mock engine through the same trait an alternative
//! transport would use, then drive sessions, the default-session registry,
//! and `mxcall` end to end against it. No native engine library is needed.

use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mexlink::{EngineApi, EngineError, MxArray, Session, SessionConfig, SessionRegistry};

/// In-memory engine: a workspace per process, statements recorded, the
/// `clear`/assignment subset of the statement language interpreted.
#[derive(Default)]
struct ScriptedEngine {
    workspace: Mutex<HashMap<String, usize>>,
    statements: Mutex<Vec<String>>,
    next_token: AtomicUsize,
}

impl ScriptedEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            next_token: AtomicUsize::new(1),
            ..Self::default()
        })
    }

    fn token(&self) -> usize {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    fn array(&self) -> MxArray {
        // SAFETY: handles are opaque tokens; nothing dereferences them.
        unsafe { MxArray::from_raw(self.token() as *mut c_void) }.expect("nonzero token")
    }

    fn temporaries(&self) -> Vec<String> {
        self.workspace
            .lock()
            .unwrap()
            .keys()
            .filter(|name| name.starts_with("jx_"))
            .cloned()
            .collect()
    }
}

impl EngineApi for ScriptedEngine {
    fn open(&self, _start_command: Option<&CStr>) -> *mut c_void {
        self.token() as *mut c_void
    }

    fn close(&self, _handle: *mut c_void) -> c_int {
        0
    }

    fn register_output_buffer(
        &self,
        _handle: *mut c_void,
        _buffer: *mut c_char,
        _capacity: c_int,
    ) -> c_int {
        0
    }

    fn eval(&self, _handle: *mut c_void, statement: &CStr) -> c_int {
        let statement = statement.to_string_lossy().into_owned();
        self.statements.lock().unwrap().push(statement.clone());

        let mut workspace = self.workspace.lock().unwrap();
        if let Some(name) = statement.strip_prefix("clear ").and_then(|s| s.strip_suffix(';')) {
            workspace.remove(name);
        } else if let Some((lhs, _)) = statement.split_once(" = ") {
            let lhs = lhs.trim_start_matches('[').trim_end_matches(']');
            for name in lhs.split(", ") {
                let token = self.token();
                workspace.insert(name.to_string(), token);
            }
        }
        0
    }

    fn put_variable(&self, _handle: *mut c_void, name: &CStr, value: *const c_void) -> c_int {
        self.workspace
            .lock()
            .unwrap()
            .insert(name.to_string_lossy().into_owned(), value as usize);
        0
    }

    fn get_variable(&self, _handle: *mut c_void, name: &CStr) -> *mut c_void {
        match self.workspace.lock().unwrap().get(name.to_string_lossy().as_ref()) {
            Some(&token) => token as *mut c_void,
            None => ptr::null_mut(),
        }
    }

    fn set_visible(&self, _handle: *mut c_void, _visible: bool) -> c_int {
        0
    }
}

fn open_session(engine: &Arc<ScriptedEngine>) -> Session {
    Session::open_on(
        engine.clone(),
        SessionConfig {
            output_capacity: 0,
            hide_window: false,
            ..SessionConfig::default()
        },
    )
    .expect("scripted engine always opens")
}

#[test]
fn variables_round_trip_through_the_workspace() {
    let engine = ScriptedEngine::new();
    let mut session = open_session(&engine);

    let value = engine.array();
    session.put_variable("data", &value).unwrap();
    let fetched = session.get_variable("data").unwrap();
    assert_eq!(fetched.as_ptr(), value.as_ptr());

    session.eval("clear data;").unwrap();
    assert!(matches!(
        session.get_variable("data"),
        Err(EngineError::GetVariable { .. })
    ));
}

#[test]
fn mxcall_produces_results_and_cleans_the_workspace() {
    let engine = ScriptedEngine::new();
    let mut session = open_session(&engine);

    let a = engine.array();
    let b = engine.array();
    let outputs = session.mxcall("plus", 1, &[&a, &b]).unwrap();
    assert_eq!(outputs.len(), 1);

    assert!(engine.temporaries().is_empty(), "temporaries leaked");
    let statements = engine.statements.lock().unwrap().clone();
    assert_eq!(statements[0], "jx_plus_out_1 = plus(jx_plus_in_1, jx_plus_in_2);");
}

#[test]
fn mxcall_without_inputs_or_outputs_runs_a_bare_call() {
    let engine = ScriptedEngine::new();
    let mut session = open_session(&engine);

    let outputs = session.mxcall("drawnow", 0, &[]).unwrap();
    assert!(outputs.is_empty());
    assert_eq!(engine.statements.lock().unwrap()[0], "drawnow();");
}

#[test]
fn registry_drives_the_same_flow_through_a_shared_slot() {
    let engine = ScriptedEngine::new();
    let registry = SessionRegistry::with_engine(engine.clone());

    registry
        .with_session(|session| session.eval("setup = 1;"))
        .unwrap();
    registry.restart(1024).unwrap();
    assert!(registry.is_active());

    let value = engine.array();
    registry
        .with_session(|session| {
            session.put_variable("x", &value)?;
            session.mxcall("sum", 1, &[&value]).map(|_| ())
        })
        .unwrap();

    registry.close();
    assert!(!registry.is_active());
    assert!(engine.temporaries().is_empty());
}

#[test]
fn sessions_are_independent_per_open() {
    let engine = ScriptedEngine::new();
    let mut first = open_session(&engine);
    let second = open_session(&engine);

    first.close();
    assert!(!first.is_open());
    assert!(second.is_open());
}
