//! Remote function-call orchestration over eval + variable primitives.
//!
//! The engine protocol only evaluates statements and exchanges named
//! variables; `mxcall` layers function-call semantics on top. A call
//! `result = f(a, b)` becomes:
//!
//! ```text
//! put  jx_f_in_1 <- a
//! put  jx_f_in_2 <- b
//! eval jx_f_out_1 = f(jx_f_in_1, jx_f_in_2);
//! get  jx_f_out_1 -> result
//! eval clear jx_f_in_1;  clear jx_f_in_2;  clear jx_f_out_1;
//! ```
//!
//! Temporary names are derived deterministically from the function symbol,
//! the argument direction, and the 1-based index, so concurrent sessions
//! never collide in their own workspaces and a successful call leaves no
//! temporaries behind.

use crate::error::EngineError;
use crate::ident::VarName;
use crate::session::Session;
use crate::variables::MxArray;

/// Argument direction of a generated temporary.
#[derive(Clone, Copy)]
enum Direction {
    In,
    Out,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// Temporary workspace names for one call: `jx_<fun>_<direction>_<index>`,
/// indices 1-based.
fn temp_names(fun: &VarName, direction: Direction, count: usize) -> Vec<VarName> {
    (1..=count)
        .map(|index| {
            VarName::from_generated(format!("jx_{}_{}_{}", fun.as_str(), direction.label(), index))
        })
        .collect()
}

/// Compose the single statement evaluating the call.
///
/// No left-hand side with zero outputs, a bare name with one, a bracketed
/// ", "-joined list with two or more.
fn compose_call(fun: &VarName, out_names: &[VarName], in_names: &[VarName]) -> String {
    let mut statement = String::new();
    match out_names {
        [] => {}
        [single] => {
            statement.push_str(single.as_str());
            statement.push_str(" = ");
        }
        many => {
            statement.push('[');
            for (index, name) in many.iter().enumerate() {
                if index > 0 {
                    statement.push_str(", ");
                }
                statement.push_str(name.as_str());
            }
            statement.push_str("] = ");
        }
    }
    statement.push_str(fun.as_str());
    statement.push('(');
    for (index, name) in in_names.iter().enumerate() {
        if index > 0 {
            statement.push_str(", ");
        }
        statement.push_str(name.as_str());
    }
    statement.push_str(");");
    statement
}

impl Session {
    /// Call the remote function `fun` with `inputs`, collecting `nout`
    /// results, over the session's eval + variable primitives.
    ///
    /// Returns the outputs in declared order; the vector is empty for
    /// `nout = 0` and has exactly `nout` entries otherwise. Ownership of
    /// the returned handles transfers to the caller as with
    /// [`Session::get_variable`].
    ///
    /// Whatever the outcome, the generated temporaries are cleared from
    /// the remote workspace: on success the `clear` evaluations are part
    /// of the call and their failure is the call's failure; after an error
    /// in the put/eval/get sequence the cleanup is best-effort, logged and
    /// never masking the original error.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidName`] when `fun` is not a valid engine
    ///   identifier
    /// - any error of [`Session::put_variable`], [`Session::eval`], or
    ///   [`Session::get_variable`], from whichever step failed first
    ///
    /// A remote-side error in the function itself (an undefined symbol, a
    /// runtime error) is not detected here: the engine reports it only as
    /// captured output, and the subsequent `get` of an output name fails
    /// with [`EngineError::GetVariable`].
    pub fn mxcall(
        &mut self,
        fun: &str,
        nout: usize,
        inputs: &[&MxArray],
    ) -> Result<Vec<MxArray>, EngineError> {
        let fun = VarName::new(fun)?;
        let in_names = temp_names(&fun, Direction::In, inputs.len());
        let out_names = temp_names(&fun, Direction::Out, nout);
        let statement = compose_call(&fun, &out_names, &in_names);

        match self.run_remote_call(&statement, &in_names, inputs, &out_names) {
            Ok(outputs) => {
                self.clear_temporaries(&in_names, &out_names)?;
                Ok(outputs)
            }
            Err(err) => {
                self.discard_temporaries(&in_names, &out_names);
                Err(err)
            }
        }
    }

    /// Puts the inputs, evaluates the composed statement, and fetches
    /// the outputs. Any failure aborts the remaining steps.
    fn run_remote_call(
        &mut self,
        statement: &str,
        in_names: &[VarName],
        inputs: &[&MxArray],
        out_names: &[VarName],
    ) -> Result<Vec<MxArray>, EngineError> {
        for (name, value) in in_names.iter().zip(inputs) {
            self.put_variable(name.as_str(), value)?;
        }
        self.eval(statement)?;

        let mut outputs = Vec::with_capacity(out_names.len());
        for name in out_names {
            outputs.push(self.get_variable(name.as_str())?);
        }
        Ok(outputs)
    }

    /// Success-path cleanup: one `clear` per generated name, inputs first,
    /// then outputs.
    fn clear_temporaries(
        &mut self,
        in_names: &[VarName],
        out_names: &[VarName],
    ) -> Result<(), EngineError> {
        for name in in_names.iter().chain(out_names) {
            self.eval(&format!("clear {name};"))?;
        }
        Ok(())
    }

    /// Error-path cleanup: clear whatever can still be cleared so failed
    /// calls do not leak temporaries into the remote workspace. Clearing
    /// an undefined name is a remote no-op, so every generated name is
    /// attempted; a session-level failure would repeat for each remaining
    /// name, so the loop stops at the first one.
    fn discard_temporaries(&mut self, in_names: &[VarName], out_names: &[VarName]) {
        if !self.is_open() {
            return;
        }
        for name in in_names.iter().chain(out_names) {
            if let Err(err) = self.eval(&format!("clear {name};")) {
                tracing::warn!(
                    name = name.as_str(),
                    error = %err,
                    "leaving temporaries behind after failed remote call"
                );
                break;
            }
        }
    }
}
