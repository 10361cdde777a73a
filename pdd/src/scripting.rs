// pdd/src/scripting.rs
//! Per-invocation QuickJS engine for the r2dec package.
//!
//! Every `run` builds a fresh runtime and context, installs the natives,
//! evaluates `require.js` and then calls `r2dec_main(args)`:
//!
//!   Idle -> EngineCreated -> NativesRegistered -> DriverLoaded -> EntryInvoked -> Idle
//!
//! The engine and the host linkage are torn down on every path out of `run`,
//! including unwinding. Nothing survives between two invocations.

use std::any::Any;
use std::cell::Cell;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use log::{debug, error, trace, warn};
use rquickjs::{Context, Ctx, Runtime};

use crate::bridge::{self, describe_error, script_options, HostLinkage};
use crate::error::ScriptError;
use crate::host::SharedHost;
use crate::resolver::ModuleResolver;

/// Driver evaluated before the entry call; it defines `r2dec_main`.
pub const DRIVER_MODULE: &str = "require.js";

/// Global function invoked with the argument tokens.
pub const ENTRY_FUNCTION: &str = "r2dec_main";

/// Printed when the driver did not define the entry function.
pub const MISSING_ENTRY: &str =
    "r2dec_main is missing: cannot use R2DEC_HOME or the r2pm install path.";

/// What to do with an engine fault that cannot be reported as a script error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatalPolicy {
    /// Report `*** FATAL ERROR` on the host output and return `ScriptError::Fatal`.
    #[default]
    Contain,
    /// Report on stderr and abort the process.
    Abort,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptHostConfig {
    /// Heap limit for the runtime, in bytes.
    pub memory_limit: Option<usize>,
    /// Native stack limit for the runtime, in bytes.
    pub max_stack_size: Option<usize>,
    /// Wall-clock budget for one invocation. No limit when unset.
    pub timeout: Option<Duration>,
    pub fatal: FatalPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    EngineCreated,
    NativesRegistered,
    DriverLoaded,
    EntryInvoked,
}

pub struct ScriptHost {
    resolver: ModuleResolver,
    config: ScriptHostConfig,
    linkage: HostLinkage,
    state: Cell<EngineState>,
    invocations: Cell<usize>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════════

impl ScriptHost {
    pub fn new(resolver: ModuleResolver, config: ScriptHostConfig) -> Self {
        Self {
            resolver,
            config,
            linkage: HostLinkage::default(),
            state: Cell::new(EngineState::Idle),
            invocations: Cell::new(0),
        }
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    pub fn config(&self) -> &ScriptHostConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// True only while an engine instance is live.
    pub fn is_linked(&self) -> bool {
        self.linkage.is_linked()
    }

    /// Number of engine instances created so far.
    pub fn invocations(&self) -> usize {
        self.invocations.get()
    }

    /// Runs the decompiler once with `args` split on whitespace.
    ///
    /// Failures are printed on the host output before they are returned.
    pub fn run(&self, host: &SharedHost, args: &str) -> Result<(), ScriptError> {
        if self.linkage.is_linked() {
            warn!("rejecting re-entrant script invocation");
            return Err(ScriptError::Busy);
        }

        self.linkage.link(host);
        let _teardown = Teardown { scripts: self };

        match panic::catch_unwind(AssertUnwindSafe(|| self.invoke(args))) {
            Ok(result) => result,
            Err(payload) => self.fatal(panic_message(payload.as_ref())),
        }
    }
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new(ModuleResolver::from_env(), ScriptHostConfig::default())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INVOCATION
// ═══════════════════════════════════════════════════════════════════════════════

impl ScriptHost {
    fn invoke(&self, args: &str) -> Result<(), ScriptError> {
        let runtime = match Runtime::new() {
            Ok(runtime) => runtime,
            Err(err) => return self.fatal(format!("cannot create the script runtime: {err}")),
        };
        if let Some(limit) = self.config.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(size) = self.config.max_stack_size {
            runtime.set_max_stack_size(size);
        }
        if let Some(timeout) = self.config.timeout {
            let deadline = Instant::now() + timeout;
            runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() >= deadline)));
        }

        let context = match Context::full(&runtime) {
            Ok(context) => context,
            Err(err) => return self.fatal(format!("cannot create the script context: {err}")),
        };
        self.invocations.set(self.invocations.get() + 1);
        self.set_state(EngineState::EngineCreated);
        debug!("engine #{} created", self.invocations.get());

        context.with(|ctx| {
            if let Err(err) = bridge::register(&ctx, &self.linkage, &self.resolver) {
                let detail = describe_error(&ctx, err);
                return self.fatal(format!("cannot register natives: {detail}"));
            }
            self.set_state(EngineState::NativesRegistered);

            self.load_driver(&ctx);
            self.set_state(EngineState::DriverLoaded);

            let result = ctx.eval_with_options::<(), _>(entry_expression(args), script_options());
            self.set_state(EngineState::EntryInvoked);
            result.map_err(|err| self.report(&ctx, ENTRY_FUNCTION, err))
        })
    }

    /// Evaluates the driver. Failures are printed and otherwise ignored; the
    /// entry check reports the broken installation afterwards.
    fn load_driver(&self, ctx: &Ctx<'_>) {
        let driver = match self.resolver.load(DRIVER_MODULE) {
            Ok(driver) => driver,
            Err(err) => {
                self.linkage.print_line(&format!("Error: {err}."));
                return;
            }
        };
        debug!("evaluating {}", driver.path.display());
        if let Err(err) = ctx.eval_with_options::<(), _>(driver.text, script_options()) {
            self.report(ctx, &driver.file, err);
        }
    }

    /// Prints `Error: <what>: <exception>` and returns it as an evaluation error.
    fn report(&self, ctx: &Ctx<'_>, what: &str, err: rquickjs::Error) -> ScriptError {
        let detail = format!("{what}: {}", describe_error(ctx, err));
        error!("script failed: {detail}");
        self.linkage.print_line(&format!("Error: {detail}"));
        ScriptError::Evaluation(detail)
    }

    fn fatal(&self, message: String) -> Result<(), ScriptError> {
        match self.config.fatal {
            FatalPolicy::Contain => {
                error!("fatal engine error: {message}");
                self.linkage.print_line(&fatal_line(&message));
                Err(ScriptError::Fatal(message))
            }
            FatalPolicy::Abort => {
                let _ = std::io::stdout().flush();
                eprintln!("{}", fatal_line(&message));
                let _ = std::io::stderr().flush();
                std::process::abort()
            }
        }
    }

    fn set_state(&self, state: EngineState) {
        trace!("engine state: {:?} -> {:?}", self.state.get(), state);
        self.state.set(state);
    }
}

/// Drops the host linkage and resets the state when `run` exits.
struct Teardown<'a> {
    scripts: &'a ScriptHost,
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        self.scripts.linkage.unlink();
        self.scripts.set_state(EngineState::Idle);
        debug!("engine torn down");
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// `if (typeof r2dec_main == 'function') { r2dec_main([...]); } else { console.log(...); }`
///
/// Tokens go in as a JSON array literal, so quotes in the arguments stay data.
pub(crate) fn entry_expression(args: &str) -> String {
    let tokens = serde_json::Value::from(args.split_whitespace().collect::<Vec<_>>());
    let missing = serde_json::Value::from(MISSING_ENTRY);
    format!(
        "if (typeof {ENTRY_FUNCTION} == 'function') {{ {ENTRY_FUNCTION}({tokens}); }} \
         else {{ console.log({missing}); }}"
    )
}

fn fatal_line(message: &str) -> String {
    format!("*** FATAL ERROR: {message}")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic in script engine".to_string()
    }
}
