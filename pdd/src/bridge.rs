// pdd/src/bridge.rs
//! Natives exposed to the r2dec scripts.
//!
//! Globals installed into every engine instance:
//!
//!   r2cmd(cmd)                  -> string   host command output
//!   ___internal_load(file)      -> string   module text, name used as given
//!   ___internal_require(module)             evaluate `<module>.js` as global code
//!   console.log/info/warn/error/debug(...)  one line on the host output
//!
//! A wrong argument type throws `TypeError`. A module that cannot be found or
//! fails to evaluate under `___internal_require` throws `EvalError`, so the
//! scripts can tell the two apart.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, warn};
use rquickjs::context::EvalOptions;
use rquickjs::convert::Coerced;
use rquickjs::function::{Constructor, Opt, Rest};
use rquickjs::{CaughtError, Ctx, Exception, Function, Object, Value};

use crate::host::{self, Host, SharedHost};
use crate::resolver::ModuleResolver;

pub const RUN_HOST_COMMAND: &str = "r2cmd";
pub const LOAD_MODULE: &str = "___internal_load";
pub const REQUIRE_MODULE: &str = "___internal_require";

const CONSOLE_METHODS: [&str; 5] = ["log", "info", "warn", "error", "debug"];

// ═══════════════════════════════════════════════════════════════════════════════
// HOST LINKAGE
// ═══════════════════════════════════════════════════════════════════════════════

/// Weak back-reference from the natives to the host session of the running
/// command. Linked right before an engine is created and unlinked right after
/// it is dropped; every native registered for that engine holds a clone.
#[derive(Clone, Default)]
pub struct HostLinkage {
    slot: Rc<RefCell<Option<Weak<RefCell<dyn Host>>>>>,
}

impl HostLinkage {
    pub fn link(&self, host: &SharedHost) {
        *self.slot.borrow_mut() = Some(Rc::downgrade(host));
    }

    pub fn unlink(&self) {
        self.slot.borrow_mut().take();
    }

    pub fn is_linked(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub fn host(&self) -> Option<SharedHost> {
        self.slot.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Prints one diagnostic line on the linked host, if any.
    pub(crate) fn print_line(&self, line: &str) {
        match self.host() {
            Some(host) => host::print_line(&host, line),
            None => warn!("no host linked, dropped output: {line}"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Installs all natives into the global object of `ctx`.
pub fn register<'js>(
    ctx: &Ctx<'js>,
    linkage: &HostLinkage,
    resolver: &ModuleResolver,
) -> rquickjs::Result<()> {
    let globals = ctx.globals();
    register_host_command(ctx, &globals, linkage.clone())?;
    register_load(ctx, &globals, linkage.clone(), resolver.clone())?;
    register_require(ctx, &globals, linkage.clone(), resolver.clone())?;
    register_console(ctx, &globals, linkage.clone())?;
    debug!("registered {RUN_HOST_COMMAND}, {LOAD_MODULE}, {REQUIRE_MODULE} and console");
    Ok(())
}

fn register_host_command<'js>(
    ctx: &Ctx<'js>,
    globals: &Object<'js>,
    linkage: HostLinkage,
) -> rquickjs::Result<()> {
    // r2cmd(command) -> String
    let r2cmd = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, command: Opt<Value<'js>>| -> rquickjs::Result<String> {
            let command = string_arg(&ctx, command, RUN_HOST_COMMAND)?;
            with_host(&ctx, &linkage, RUN_HOST_COMMAND, |host| host.cmd(&command))
        },
    )?;
    globals.set(RUN_HOST_COMMAND, r2cmd)
}

fn register_load<'js>(
    ctx: &Ctx<'js>,
    globals: &Object<'js>,
    linkage: HostLinkage,
    resolver: ModuleResolver,
) -> rquickjs::Result<()> {
    // ___internal_load(file) -> String
    let load = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, name: Opt<Value<'js>>| -> rquickjs::Result<String> {
            let name = string_arg(&ctx, name, LOAD_MODULE)?;
            match resolver.load(&name) {
                Ok(module) => Ok(module.text),
                Err(err) => {
                    linkage.print_line(&format!("Error: {err}."));
                    Err(Exception::throw_type(&ctx, &err.to_string()))
                }
            }
        },
    )?;
    globals.set(LOAD_MODULE, load)
}

fn register_require<'js>(
    ctx: &Ctx<'js>,
    globals: &Object<'js>,
    linkage: HostLinkage,
    resolver: ModuleResolver,
) -> rquickjs::Result<()> {
    // ___internal_require(module): evaluates <module>.js in the global scope
    let require = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, name: Opt<Value<'js>>| -> rquickjs::Result<()> {
            let name = string_arg(&ctx, name, REQUIRE_MODULE)?;
            let module = match resolver.require(&name) {
                Ok(module) => module,
                Err(err) => {
                    linkage.print_line(&format!("Error: {err}."));
                    return Err(throw_eval(&ctx, &err.to_string()));
                }
            };

            debug!("evaluating {}", module.path.display());
            let file = module.file;
            ctx.eval_with_options::<(), _>(module.text, script_options())
                .map_err(|err| {
                    let detail = describe_error(&ctx, err);
                    throw_eval(&ctx, &format!("{file}: {detail}"))
                })
        },
    )?;
    globals.set(REQUIRE_MODULE, require)
}

fn register_console<'js>(
    ctx: &Ctx<'js>,
    globals: &Object<'js>,
    linkage: HostLinkage,
) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;
    for method in CONSOLE_METHODS {
        let linkage = linkage.clone();
        let print = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Coerced<String>>| -> rquickjs::Result<()> {
                let line = args
                    .0
                    .into_iter()
                    .map(|arg| arg.0)
                    .collect::<Vec<_>>()
                    .join(" ");
                with_host(&ctx, &linkage, "console", |host| {
                    host.print(&format!("{line}\n"))
                })
            },
        )?;
        console.set(method, print)?;
    }
    globals.set("console", console)
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Global, sloppy-mode evaluation: top-level `var`/`function` land on the
/// global object, which is how the r2dec modules share their definitions.
pub(crate) fn script_options() -> EvalOptions {
    let mut options = EvalOptions::default();
    options.global = true;
    options.strict = false;
    options
}

/// Takes the pending exception behind `err` and renders it on one line:
/// `Name: message` for error objects, `thrown value: <value>` otherwise.
pub(crate) fn describe_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> String {
    let text = match CaughtError::from_error(ctx, err) {
        CaughtError::Exception(exception) => {
            let name = exception
                .as_object()
                .get::<_, String>("name")
                .unwrap_or_else(|_| "Error".to_string());
            if let Some(stack) = exception.stack() {
                debug!("script stack:\n{stack}");
            }
            format!("{name}: {}", exception.message().unwrap_or_default())
        }
        CaughtError::Value(value) => {
            let shown = value
                .get::<Coerced<String>>()
                .map(|text| text.0)
                .unwrap_or_else(|_| value.type_name().to_string());
            format!("thrown value: {shown}")
        }
        CaughtError::Error(err) => err.to_string(),
    };
    text.trim().to_string()
}

fn string_arg<'js>(ctx: &Ctx<'js>, arg: Opt<Value<'js>>, func: &str) -> rquickjs::Result<String> {
    match arg.0 {
        Some(value) if value.is_string() => value.get::<String>(),
        Some(value) => Err(Exception::throw_type(
            ctx,
            &format!("{func}: expected a string, got {}", value.type_name()),
        )),
        None => Err(Exception::throw_type(
            ctx,
            &format!("{func}: expected a string argument"),
        )),
    }
}

fn throw_eval(ctx: &Ctx<'_>, message: &str) -> rquickjs::Error {
    let error = ctx
        .globals()
        .get::<_, Constructor>("EvalError")
        .and_then(|ctor| ctor.construct::<_, Value>((message,)));
    match error {
        Ok(error) => ctx.throw(error),
        Err(err) => err,
    }
}

fn with_host<R>(
    ctx: &Ctx<'_>,
    linkage: &HostLinkage,
    func: &str,
    f: impl FnOnce(&mut dyn Host) -> R,
) -> rquickjs::Result<R> {
    let Some(shared) = linkage.host() else {
        return Err(Exception::throw_internal(
            ctx,
            &format!("{func}: no host session is linked"),
        ));
    };
    let Ok(mut host) = shared.try_borrow_mut() else {
        return Err(Exception::throw_internal(
            ctx,
            &format!("{func}: host session is busy"),
        ));
    };
    Ok(f(&mut *host))
}
