// Frame interpreter
// Executes flat `Proto` code with an explicit operand stack per frame. Lua
// calls push frames on the same stack (no host recursion); native calls that
// re-enter the engine run a nested frame stack. A coroutine suspends by
// returning its whole frame stack to the owning thread.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::compiler::{ArgCount, Instr, Proto, RetCount};
use crate::lua_value::{CoroutineStatus, LuaClosure, LuaThread, LuaValue};
use crate::lua_vm::operators;
use crate::lua_vm::{LuaError, LuaResult, LuaVm, Scope};

pub struct Frame {
    pub proto: Rc<Proto>,
    pub ip: usize,
    pub stack: Vec<LuaValue>,
    pub scope: Rc<RefCell<Scope>>,
    /// Scope-chain depth relative to the frame entry scope.
    pub depth: usize,
    /// Size of the pending multi-value group on top of the stack.
    pub multi: usize,
    /// Multi-assignment scratch values.
    pub scratch: Vec<LuaValue>,
    /// How many results the calling frame expects.
    pub ret_want: RetCount,
    /// Set while suspended at a yield: how many resume values to push.
    pub pending_resume: Option<RetCount>,
}

impl Frame {
    /// Activate a closure: extend its captured scope (when the body binds
    /// anything), bind parameters, and collect trailing varargs.
    pub fn activate(closure: &LuaClosure, mut args: Vec<LuaValue>, ret_want: RetCount) -> Frame {
        let proto = closure.proto.clone();
        let scope = if proto.opens_scope {
            Scope::extend(&closure.scope)
        } else {
            closure.scope.clone()
        };
        {
            let mut s = scope.borrow_mut();
            for (i, param) in proto.params.iter().enumerate() {
                let v = args.get(i).cloned().unwrap_or(LuaValue::Nil);
                s.set_local(param.clone(), v);
            }
            if proto.is_vararg {
                let rest = if args.len() > proto.params.len() {
                    args.split_off(proto.params.len())
                } else {
                    Vec::new()
                };
                s.set_varargs(rest);
            }
        }
        Frame {
            proto,
            ip: 0,
            stack: Vec::new(),
            scope,
            depth: 0,
            multi: 0,
            scratch: Vec::new(),
            ret_want,
            pending_resume: None,
        }
    }
}

/// How a frame stack finished.
pub enum RunOutcome {
    Return(Vec<LuaValue>),
    Yield(Vec<LuaValue>),
}

fn uncallable() -> LuaError {
    LuaError::runtime("attempt to call an uncallable type")
}

impl LuaVm {
    /// Call any callable from host context and run it to completion.
    pub fn call_value(&mut self, f: LuaValue, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
        match f {
            LuaValue::Native(nf) => (nf.func)(self, args),
            LuaValue::Function(closure) => {
                let mut frames = vec![Frame::activate(&closure, args, RetCount::Multi)];
                match self.run_frames(&mut frames, false)? {
                    RunOutcome::Return(vals) => Ok(vals),
                    RunOutcome::Yield(_) => unreachable!("yield outside a coroutine"),
                }
            }
            LuaValue::Thread(t) => {
                let (ok, mut vals) = self.resume_thread(&t, args)?;
                let mut out = vec![LuaValue::Boolean(ok)];
                out.append(&mut vals);
                Ok(out)
            }
            LuaValue::Table(ref t) => {
                let mm = t.borrow().metamethod("__call").ok_or_else(uncallable)?;
                let mut all = Vec::with_capacity(args.len() + 1);
                all.push(f.clone());
                all.extend(args);
                self.call_value(mm, all)
            }
            _ => Err(uncallable()),
        }
    }

    /// Run a chunk proto: its scope chain hangs off the root scope and the
    /// chunk receives `args` as varargs.
    pub fn run_chunk(&mut self, proto: Rc<Proto>, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
        let closure = LuaClosure {
            proto,
            scope: self.root_scope.clone(),
        };
        let mut frames = vec![Frame::activate(&closure, args, RetCount::Multi)];
        match self.run_frames(&mut frames, false)? {
            RunOutcome::Return(vals) => Ok(vals),
            RunOutcome::Yield(_) => unreachable!("yield outside a coroutine"),
        }
    }

    /// Resume a suspended thread. Returns Lua's `(ok, values...)` pair:
    /// domain errors inside the body are caught and reported as
    /// `(false, message)`; the `current` pointer is restored on every exit
    /// path.
    pub fn resume_thread(
        &mut self,
        thread: &Rc<RefCell<LuaThread>>,
        args: Vec<LuaValue>,
    ) -> LuaResult<(bool, Vec<LuaValue>)> {
        {
            let t = thread.borrow();
            match t.status {
                CoroutineStatus::Dead => {
                    return Err(LuaError::runtime("cannot resume dead coroutine"))
                }
                CoroutineStatus::Running => {
                    return Err(LuaError::runtime("cannot resume non-suspended coroutine"))
                }
                CoroutineStatus::Suspended => {}
            }
        }

        let mut frames = std::mem::take(&mut thread.borrow_mut().frames);
        let started = thread.borrow().started;

        if !started {
            let body = thread.borrow().body.clone();
            thread.borrow_mut().started = true;
            match body {
                LuaValue::Function(closure) => {
                    frames.push(Frame::activate(&closure, args, RetCount::Multi));
                }
                LuaValue::Native(nf) => {
                    // a native body cannot suspend; it runs to completion
                    thread.borrow_mut().status = CoroutineStatus::Running;
                    let prev = std::mem::replace(&mut self.current_thread, thread.clone());
                    let result = (nf.func)(self, args);
                    self.current_thread = prev;
                    thread.borrow_mut().status = CoroutineStatus::Dead;
                    return match result {
                        Ok(vals) => Ok((true, vals)),
                        Err(e) => Ok((false, vec![LuaValue::string(e.message())])),
                    };
                }
                _ => {
                    thread.borrow_mut().status = CoroutineStatus::Dead;
                    return Err(uncallable());
                }
            }
        } else if let Some(frame) = frames.last_mut() {
            // deliver the resume arguments as the result of the yield
            let want = frame.pending_resume.take().unwrap_or(RetCount::Fixed(0));
            push_results(frame, args, want);
        }

        thread.borrow_mut().status = CoroutineStatus::Running;
        let prev = std::mem::replace(&mut self.current_thread, thread.clone());
        let result = self.run_frames(&mut frames, true);
        self.current_thread = prev;

        match result {
            Ok(RunOutcome::Return(vals)) => {
                thread.borrow_mut().status = CoroutineStatus::Dead;
                Ok((true, vals))
            }
            Ok(RunOutcome::Yield(vals)) => {
                let mut t = thread.borrow_mut();
                t.status = CoroutineStatus::Suspended;
                t.frames = frames;
                Ok((true, vals))
            }
            Err(e) => {
                thread.borrow_mut().status = CoroutineStatus::Dead;
                Ok((false, vec![LuaValue::string(e.message())]))
            }
        }
    }

    /// The interpreter loop over one frame stack.
    pub(crate) fn run_frames(
        &mut self,
        frames: &mut Vec<Frame>,
        can_yield: bool,
    ) -> LuaResult<RunOutcome> {
        loop {
            let instr = {
                let frame = top(frames);
                if frame.ip >= frame.proto.code.len() {
                    // implicit return at the end of a body
                    Instr::Return(ArgCount::Fixed(0))
                } else {
                    let i = frame.proto.code[frame.ip].clone();
                    frame.ip += 1;
                    i
                }
            };

            match instr {
                Instr::Nil => push(frames, LuaValue::Nil),
                Instr::True => push(frames, LuaValue::Boolean(true)),
                Instr::False => push(frames, LuaValue::Boolean(false)),
                Instr::Number(n) => push(frames, LuaValue::Number(n)),
                Instr::Str(s) => push(frames, LuaValue::Str(s)),
                Instr::Dup => {
                    let frame = top(frames);
                    let v = frame.stack.last().cloned().unwrap_or(LuaValue::Nil);
                    frame.stack.push(v);
                }
                Instr::Swap => {
                    let frame = top(frames);
                    let len = frame.stack.len();
                    frame.stack.swap(len - 1, len - 2);
                }
                Instr::Pop(n) => {
                    let frame = top(frames);
                    let keep = frame.stack.len().saturating_sub(n);
                    frame.stack.truncate(keep);
                }

                Instr::GetName(name) => {
                    let scope = top(frames).scope.clone();
                    let value = match Scope::lookup(&scope, &name) {
                        Some(v) => v,
                        None => {
                            let globals = Scope::globals(&scope);
                            operators::index_get(
                                self,
                                LuaValue::Table(globals),
                                LuaValue::Str(name),
                            )?
                        }
                    };
                    push(frames, value);
                }
                Instr::SetName(name) => {
                    let v = pop(frames);
                    let scope = top(frames).scope.clone();
                    if let Some(v) = Scope::assign(&scope, &name, v) {
                        let globals = Scope::globals(&scope);
                        operators::index_set(
                            self,
                            LuaValue::Table(globals),
                            LuaValue::Str(name),
                            v,
                        )?;
                    }
                }
                Instr::SetLocal(name) => {
                    let v = pop(frames);
                    let frame = top(frames);
                    frame.scope.borrow_mut().set_local(name, v);
                }
                Instr::Varargs(ret) => {
                    let frame = top(frames);
                    let va = Scope::varargs(&frame.scope);
                    push_results(frame, va.as_ref().clone(), ret);
                }

                Instr::Index => {
                    let key = pop(frames);
                    let base = pop(frames);
                    let v = operators::index_get(self, base, key)?;
                    push(frames, v);
                }
                Instr::SetIndex => {
                    let value = pop(frames);
                    let key = pop(frames);
                    let base = pop(frames);
                    operators::index_set(self, base, key, value)?;
                }

                Instr::NewTable => push(frames, operators::new_table_value()),
                Instr::TableSet(i) => {
                    let value = pop(frames);
                    let frame = top(frames);
                    let table = frame.stack.last().and_then(|v| v.as_table().cloned());
                    match table {
                        Some(t) => t.borrow_mut().set_int(i, value),
                        None => unreachable!("table constructor without table"),
                    }
                }
                Instr::TableSetKeyed => {
                    let value = pop(frames);
                    let key = pop(frames);
                    let frame = top(frames);
                    let table = frame.stack.last().and_then(|v| v.as_table().cloned());
                    match table {
                        Some(t) => t.borrow_mut().raw_set(&key, value)?,
                        None => unreachable!("table constructor without table"),
                    }
                }
                Instr::TableSpread(start) => {
                    let frame = top(frames);
                    let n = frame.multi;
                    frame.multi = 0;
                    let vals = split_off(frame, n);
                    let table = frame.stack.last().and_then(|v| v.as_table().cloned());
                    match table {
                        Some(t) => {
                            let mut t = t.borrow_mut();
                            for (j, v) in vals.into_iter().enumerate() {
                                t.set_int(start + j, v);
                            }
                        }
                        None => unreachable!("table constructor without table"),
                    }
                }

                Instr::BinOp(op) => {
                    let b = pop(frames);
                    let a = pop(frames);
                    let r = operators::binop(self, op, a, b)?;
                    push(frames, r);
                }
                Instr::UnOp(op) => {
                    let v = pop(frames);
                    let r = operators::unop(self, op, v)?;
                    push(frames, r);
                }

                Instr::Jump(t) => top(frames).ip = t,
                Instr::JumpIfFalse(t) => {
                    let v = pop(frames);
                    if !v.is_truthy() {
                        top(frames).ip = t;
                    }
                }
                Instr::JumpIfFalsePeek(t) => {
                    let frame = top(frames);
                    let truthy = frame.stack.last().map(|v| v.is_truthy()).unwrap_or(false);
                    if !truthy {
                        frame.ip = t;
                    }
                }
                Instr::JumpIfTruePeek(t) => {
                    let frame = top(frames);
                    let truthy = frame.stack.last().map(|v| v.is_truthy()).unwrap_or(false);
                    if truthy {
                        frame.ip = t;
                    }
                }
                Instr::JumpIfNil(t) => {
                    let v = pop(frames);
                    if v.is_nil() {
                        top(frames).ip = t;
                    }
                }
                Instr::LeaveJump { depth, target } => {
                    let frame = top(frames);
                    while frame.depth > depth {
                        frame.scope = parent_scope(&frame.scope);
                        frame.depth -= 1;
                    }
                    frame.ip = target;
                }

                Instr::ForPrep => {
                    let step = pop(frames);
                    let limit = pop(frames);
                    let init = pop(frames);
                    let init = numeric_for_value(&init, "initial")?;
                    let limit = numeric_for_value(&limit, "limit")?;
                    let step = numeric_for_value(&step, "step")?;
                    if step == 0.0 {
                        return Err(LuaError::runtime("'for' step is zero"));
                    }
                    push(frames, LuaValue::Number(init));
                    push(frames, LuaValue::Number(limit));
                    push(frames, LuaValue::Number(step));
                }
                Instr::ForTest(t) => {
                    let step = pop(frames).as_number().unwrap_or(f64::NAN);
                    let limit = pop(frames).as_number().unwrap_or(f64::NAN);
                    let index = pop(frames).as_number().unwrap_or(f64::NAN);
                    let continues = if step > 0.0 {
                        index <= limit
                    } else {
                        index >= limit
                    };
                    if !continues {
                        top(frames).ip = t;
                    }
                }

                Instr::PushScope => {
                    let frame = top(frames);
                    frame.scope = Scope::extend(&frame.scope);
                    frame.depth += 1;
                }
                Instr::PopScope => {
                    let frame = top(frames);
                    frame.scope = parent_scope(&frame.scope);
                    frame.depth -= 1;
                }

                Instr::Call { nargs, ret } => {
                    let frame = top(frames);
                    let n = resolve_count(frame, nargs);
                    let args = split_off(frame, n);
                    let f = frame.stack.pop().unwrap_or(LuaValue::Nil);
                    self.dispatch_call(frames, f, args, ret)?;
                }
                Instr::Return(have) => {
                    let frame = top(frames);
                    let n = resolve_count(frame, have);
                    let vals = split_off(frame, n);
                    let Some(finished) = frames.pop() else {
                        unreachable!("return without an active frame");
                    };
                    match frames.last_mut() {
                        None => return Ok(RunOutcome::Return(vals)),
                        Some(caller) => push_results(caller, vals, finished.ret_want),
                    }
                }
                Instr::Yield { nargs, ret } => {
                    if !can_yield {
                        return Err(LuaError::runtime(
                            "attempt to yield from outside a coroutine",
                        ));
                    }
                    let frame = top(frames);
                    let n = resolve_count(frame, nargs);
                    let vals = split_off(frame, n);
                    frame.pending_resume = Some(ret);
                    trace!(values = vals.len(), "coroutine yield");
                    return Ok(RunOutcome::Yield(vals));
                }
                Instr::Closure(idx) => {
                    let frame = top(frames);
                    let proto = frame.proto.protos[idx].clone();
                    let closure = LuaClosure {
                        proto,
                        scope: frame.scope.clone(),
                    };
                    frame.stack.push(LuaValue::Function(Rc::new(closure)));
                }

                Instr::Adjust { want, have } => {
                    let frame = top(frames);
                    let n = resolve_count(frame, have);
                    let base = frame.stack.len() - n;
                    frame.stack.resize(base + want, LuaValue::Nil);
                }
                Instr::Stash(n) => {
                    let frame = top(frames);
                    frame.scratch = split_off(frame, n);
                }
                Instr::Unstash(i) => {
                    let frame = top(frames);
                    let v = frame.scratch.get(i).cloned().unwrap_or(LuaValue::Nil);
                    frame.stack.push(v);
                }
            }
        }
    }

    /// Call dispatch from inside the interpreter: Lua closures push a frame,
    /// everything else completes inline.
    fn dispatch_call(
        &mut self,
        frames: &mut Vec<Frame>,
        f: LuaValue,
        args: Vec<LuaValue>,
        ret: RetCount,
    ) -> LuaResult<()> {
        match f {
            LuaValue::Function(closure) => {
                frames.push(Frame::activate(&closure, args, ret));
                Ok(())
            }
            LuaValue::Native(nf) => {
                let results = (nf.func)(self, args)?;
                push_results(top(frames), results, ret);
                Ok(())
            }
            LuaValue::Thread(t) => {
                let (ok, mut vals) = self.resume_thread(&t, args)?;
                let mut out = vec![LuaValue::Boolean(ok)];
                out.append(&mut vals);
                push_results(top(frames), out, ret);
                Ok(())
            }
            LuaValue::Table(ref t) => {
                let mm = t.borrow().metamethod("__call").ok_or_else(uncallable)?;
                let mut all = Vec::with_capacity(args.len() + 1);
                all.push(f.clone());
                all.extend(args);
                self.dispatch_call(frames, mm, all, ret)
            }
            _ => Err(uncallable()),
        }
    }
}

/// The active frame. The run loop returns before the stack can drain, so an
/// empty stack here is a lowering bug, not a runtime condition.
fn top(frames: &mut [Frame]) -> &mut Frame {
    match frames.last_mut() {
        Some(frame) => frame,
        None => unreachable!("interpreting with an empty frame stack"),
    }
}

/// Parent of a block scope. PushScope/PopScope are emitted in balanced
/// pairs, so a missing parent is a lowering bug.
fn parent_scope(scope: &Rc<RefCell<Scope>>) -> Rc<RefCell<Scope>> {
    match scope.borrow().parent() {
        Some(parent) => parent,
        None => unreachable!("scope chain underflow"),
    }
}

fn push(frames: &mut [Frame], v: LuaValue) {
    top(frames).stack.push(v);
}

fn pop(frames: &mut [Frame]) -> LuaValue {
    top(frames).stack.pop().unwrap_or(LuaValue::Nil)
}

fn resolve_count(frame: &mut Frame, count: ArgCount) -> usize {
    match count {
        ArgCount::Fixed(n) => n,
        ArgCount::Variadic(n) => {
            let m = frame.multi;
            frame.multi = 0;
            n + m
        }
    }
}

fn split_off(frame: &mut Frame, n: usize) -> Vec<LuaValue> {
    let base = frame.stack.len() - n;
    frame.stack.split_off(base)
}

/// Deliver call results according to the caller's expectation.
fn push_results(frame: &mut Frame, mut results: Vec<LuaValue>, want: RetCount) {
    match want {
        RetCount::Fixed(n) => {
            results.resize(n, LuaValue::Nil);
            frame.stack.append(&mut results);
        }
        RetCount::Multi => {
            frame.multi = results.len();
            frame.stack.append(&mut results);
        }
    }
}

fn numeric_for_value(v: &LuaValue, what: &str) -> LuaResult<f64> {
    crate::lua_vm::coercion::to_number(v)
        .ok_or_else(|| LuaError::runtime(format!("'for' {} must be a number", what)))
}
