//! Overload resolution.
//!
//! Every candidate of an overload set is scored in `[0, 1]` against the
//! call-site arguments. Viable candidates (score > 0) are tried from the
//! best score down; a failing invocation falls through to the next one, a
//! failing conversion does not.

use crate::bridge::Bridge;
use crate::engine::ScriptEngine;
use crate::error::{InteropError, InteropResult};
use crate::host::{ArrayData, HostArray, HostValue};
use crate::registration::{Callable, HostCall};
use crate::script::ScriptValue;
use crate::types::HostType;
use once_cell::unsync::OnceCell;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Penalty applied to members declared by an ancestor of the target's class
const INHERITED_PENALTY: f64 = 0.9;

/// Score of a variadic candidate called with no arguments at all
const EMPTY_VARARGS_SCORE: f64 = 0.99;

/// Contribution of each ladder rung
struct Ladder {
    exact: f64,
    function: f64,
    object: f64,
    assignable: f64,
    null: f64,
    primitive: f64,
    approximate: f64,
}

const FIXED: Ladder = Ladder {
    exact: 1.0,
    function: 0.95,
    object: 0.85,
    assignable: 0.9,
    null: 0.9,
    primitive: 0.8,
    approximate: 0.7,
};

const VARIADIC: Ladder = Ladder {
    exact: 0.95,
    function: 0.95,
    object: 0.85,
    assignable: 0.85,
    null: 0.85,
    primitive: 0.75,
    approximate: 0.65,
};

// ============================================================================
// Virtual arguments
// ============================================================================

/// A call-site argument kept in its engine form and, once needed, its host
/// form. The host form is converted at most once no matter how many
/// candidates look at it.
pub struct VirtualArgument {
    script: Option<ScriptValue>,
    host: OnceCell<HostValue>,
}

impl VirtualArgument {
    /// Argument received from the engine (borrowed for the call)
    pub fn from_script(value: ScriptValue) -> Self {
        Self {
            script: Some(value),
            host: OnceCell::new(),
        }
    }

    /// Argument that only exists on the host side
    pub fn from_host(value: HostValue) -> Self {
        Self {
            script: None,
            host: OnceCell::with_value(value),
        }
    }

    /// Engine form, if the argument came from the engine
    pub fn script(&self) -> Option<&ScriptValue> {
        self.script.as_ref()
    }

    /// Host form, converting on first use
    pub fn host(&self, cx: &Invocation<'_>) -> InteropResult<&HostValue> {
        self.host.get_or_try_init(|| match &self.script {
            Some(value) => cx.bridge.to_host(cx.engine, value),
            None => Ok(HostValue::Null),
        })
    }
}

impl fmt::Debug for VirtualArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.script, self.host.get()) {
            (Some(script), _) => write!(f, "{script:?}"),
            (None, Some(host)) => write!(f, "{host:?}"),
            (None, None) => f.write_str("<empty>"),
        }
    }
}

/// Wrap borrowed engine arguments
pub fn virtual_arguments(args: &[ScriptValue]) -> Vec<VirtualArgument> {
    args.iter().cloned().map(VirtualArgument::from_script).collect()
}

// ============================================================================
// Invocation context
// ============================================================================

static UNDEFINED: ScriptValue = ScriptValue::Undefined;

/// Everything a candidate needs besides its arguments
#[derive(Clone, Copy)]
pub struct Invocation<'a> {
    /// Engine driving the call
    pub engine: &'a dyn ScriptEngine,
    /// Bridge used for argument conversion
    pub bridge: &'a Bridge,
    /// Exposed member name, used in errors
    pub member: &'a str,
    /// Host receiver; null for constructors and static access
    pub target: &'a HostValue,
    /// Script receiver, prepended for `this_required` members
    pub this: &'a ScriptValue,
}

impl<'a> Invocation<'a> {
    /// Context without a receiver
    pub fn new(engine: &'a dyn ScriptEngine, bridge: &'a Bridge, member: &'a str) -> Self {
        Self {
            engine,
            bridge,
            member,
            target: &HostValue::Null,
            this: &UNDEFINED,
        }
    }

    /// Set the host receiver
    pub fn with_target(mut self, target: &'a HostValue) -> Self {
        self.target = target;
        self
    }

    /// Set the script receiver
    pub fn with_this(mut self, this: &'a ScriptValue) -> Self {
        self.this = this;
        self
    }
}

type ArgumentView<'v> = SmallVec<[&'v VirtualArgument; 8]>;

/// Arguments as seen by `callable`: the script receiver comes first when
/// the member requires it
fn view<'v>(
    callable: &Callable,
    this: Option<&'v VirtualArgument>,
    args: &'v [VirtualArgument],
) -> ArgumentView<'v> {
    let leading = this.filter(|_| callable.markers().this_required);
    leading.into_iter().chain(args.iter()).collect()
}

// ============================================================================
// Scoring
// ============================================================================

/// Contribution of one argument against one parameter, `None` when the
/// argument cannot be passed at all
fn contribution(
    param: &HostType,
    arg: &VirtualArgument,
    ladder: &Ladder,
    cx: &Invocation<'_>,
) -> InteropResult<Option<f64>> {
    if let Some(script) = arg.script() {
        if param.accepts_script_exactly(script) {
            return Ok(Some(ladder.exact));
        }
        if param.is_interface() {
            if script.is_function() {
                return Ok(Some(ladder.function));
            }
            if script.is_plain_object_shaped() {
                return Ok(Some(ladder.object));
            }
        }
    }
    let host = arg.host(cx)?;
    if host.is_null() {
        return Ok((!param.is_primitive()).then_some(ladder.null));
    }
    if param.is_assignable_from(host) {
        return Ok(Some(ladder.assignable));
    }
    if param.is_primitive() && param.coerce_exact(host).is_some() {
        return Ok(Some(ladder.primitive));
    }
    if param.coerce_approximate(host).is_some() {
        return Ok(Some(ladder.approximate));
    }
    Ok(None)
}

/// Element type of a variadic tail declared as `T[]`
fn element_type(param: &HostType) -> &HostType {
    match param {
        HostType::Array(element) => element,
        other => other,
    }
}

fn score_view(
    callable: &Callable,
    args: &[&VirtualArgument],
    cx: &Invocation<'_>,
) -> InteropResult<f64> {
    let params = callable.params();
    let varargs = callable.is_varargs();
    let length = args.len();

    if length == 0 {
        return Ok(match (varargs, params.len()) {
            (false, 0) => 1.0,
            (true, 1) => EMPTY_VARARGS_SCORE,
            _ => 0.0,
        });
    }

    let fixed = if varargs { params.len() - 1 } else { params.len() };
    let viable = if varargs {
        length >= fixed
    } else {
        length == params.len()
    };
    if !viable {
        return Ok(0.0);
    }

    let mut total = 0.0;
    for (param, arg) in params[..fixed].iter().zip(args) {
        match contribution(param, arg, &FIXED, cx)? {
            Some(value) => total += value,
            None => return Ok(0.0),
        }
    }
    if varargs && (fixed == 0 || total > 0.0) {
        let element = element_type(&params[fixed]);
        for arg in &args[fixed..] {
            match contribution(element, arg, &VARIADIC, cx)? {
                Some(value) => total += value,
                None => return Ok(0.0),
            }
        }
    }
    if total <= 0.0 {
        return Ok(0.0);
    }

    let mut score = total / length as f64;
    if cx
        .target
        .class_id()
        .is_some_and(|id| id != callable.declaring())
    {
        score *= INHERITED_PENALTY;
    }
    Ok(score)
}

/// Score `callable` against `args`.
///
/// Returns 0 for candidates that cannot take the arguments. Fails only
/// when an argument cannot be converted to its host form.
pub fn score(
    callable: &Callable,
    args: &[VirtualArgument],
    cx: &Invocation<'_>,
) -> InteropResult<f64> {
    let this = VirtualArgument::from_script(cx.this.clone());
    score_view(callable, &view(callable, Some(&this), args), cx)
}

/// A viable candidate and its score
#[derive(Clone)]
pub struct Ranked {
    /// The candidate
    pub callable: Arc<Callable>,
    /// Its score in `(0, 1]`
    pub score: f64,
}

impl fmt::Debug for Ranked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} = {:.3}", self.callable, self.score)
    }
}

/// Viable candidates, best first. Ties keep declaration order.
pub fn rank(
    candidates: &[Arc<Callable>],
    args: &[VirtualArgument],
    cx: &Invocation<'_>,
) -> InteropResult<Vec<Ranked>> {
    let this = VirtualArgument::from_script(cx.this.clone());
    let mut ranked = Vec::with_capacity(candidates.len());
    for callable in candidates {
        let score = score_view(callable, &view(callable, Some(&this), args), cx)?;
        trace!(member = cx.member, candidate = ?callable, score, "scored overload");
        if score > 0.0 {
            ranked.push(Ranked {
                callable: callable.clone(),
                score,
            });
        }
    }
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(ranked)
}

// ============================================================================
// Dispatch
// ============================================================================

/// Invoke candidates in order until one succeeds.
///
/// Returns the first success. Otherwise returns the last failure, or
/// `None` when there was nothing to try. A conversion failure stops the
/// walk immediately.
pub fn try_in_order<C, T>(
    candidates: impl IntoIterator<Item = C>,
    mut invoke: impl FnMut(C) -> InteropResult<T>,
) -> Result<T, Option<InteropError>> {
    let mut last = None;
    for candidate in candidates {
        match invoke(candidate) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_conversion_failure() => return Err(Some(err)),
            Err(err) => last = Some(err),
        }
    }
    Err(last)
}

/// Coerce one argument to the parameter it was scored against
fn coerce_argument(
    param: &HostType,
    arg: &VirtualArgument,
    cx: &Invocation<'_>,
) -> InteropResult<HostValue> {
    if let Some(script) = arg.script() {
        if let HostType::Script(kind) = param {
            if kind.accepts(script.kind()) {
                return Ok(HostValue::Script(script.clone()));
            }
        }
        if param.is_interface() && (script.is_function() || script.is_plain_object_shaped()) {
            return Ok(HostValue::Script(script.clone()));
        }
    }
    let host = arg.host(cx)?;
    if host.is_null() || param.is_assignable_from(host) {
        return Ok(host.clone());
    }
    param
        .coerce_exact(host)
        .or_else(|| param.coerce_approximate(host))
        .ok_or_else(|| {
            InteropError::conversion(format!(
                "cannot pass {} as {param} to '{}'",
                host.type_name(),
                cx.member
            ))
        })
}

/// Coerce the arguments for `callable` and run it
pub fn invoke(
    callable: &Callable,
    args: &[VirtualArgument],
    cx: &Invocation<'_>,
) -> InteropResult<HostValue> {
    let this = VirtualArgument::from_script(cx.this.clone());
    let args = view(callable, Some(&this), args);
    let params = callable.params();
    let fixed = if callable.is_varargs() {
        params.len() - 1
    } else {
        params.len()
    };

    let mut values = Vec::with_capacity(params.len());
    for (param, arg) in params[..fixed].iter().zip(args.iter()) {
        values.push(coerce_argument(param, arg, cx)?);
    }
    if callable.is_varargs() {
        let element = element_type(&params[fixed]);
        let tail = args
            .get(fixed..)
            .unwrap_or_default()
            .iter()
            .map(|arg| coerce_argument(element, arg, cx))
            .collect::<InteropResult<Vec<_>>>()?;
        let packed = ArrayData::from_values(element, tail)?;
        values.push(HostValue::Array(HostArray::new(packed)));
    }

    let receiver = if callable.is_static() {
        HostValue::Null
    } else {
        cx.target.clone()
    };
    let mut call = HostCall::new(cx.engine, cx.bridge, receiver, values);
    callable.invoke(&mut call)
}

/// Resolve an overload set against `args` and invoke the best viable
/// candidate, falling back down the ranking on failure.
pub fn execute(
    candidates: &[Arc<Callable>],
    args: &[VirtualArgument],
    cx: &Invocation<'_>,
) -> InteropResult<HostValue> {
    let ranked = rank(candidates, args, cx)?;
    if ranked.is_empty() {
        debug!(member = cx.member, args = ?args, "no viable overload");
        return Err(InteropError::no_viable_overload(cx.member));
    }
    try_in_order(&ranked, |candidate| {
        invoke(&candidate.callable, args, cx).inspect_err(|err| {
            debug!(member = cx.member, candidate = ?candidate, error = %err, "overload failed");
        })
    })
    .map_err(|last| match last {
        Some(err) if err.is_conversion_failure() => err,
        Some(err) => InteropError::InvocationFailure {
            member: cx.member.to_string(),
            message: err.message(),
        },
        None => InteropError::no_viable_overload(cx.member),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::InMemoryEngine;
    use crate::registration::HostClass;
    use parking_lot::Mutex;

    struct Calc;

    fn calc() -> Arc<HostClass> {
        HostClass::builder::<Calc>("Calc")
            .static_method("pick", [], |_| Ok("none".into()))
            .static_varargs_method("pick", [HostType::array(HostType::Int)], |call| {
                let HostValue::Array(values) = call.arg(0) else {
                    return Err(InteropError::host("expected an array"));
                };
                Ok(HostValue::Int(values.len() as i32))
            })
            .static_method("half", [HostType::Int], |call| Ok((call.int(0)? / 2).into()))
            .static_method("half", [HostType::Double], |call| Ok((call.double(0)? / 2.0).into()))
            .static_method("fail", [HostType::Any], |_| Err(InteropError::host("first")))
            .static_method("fail", [HostType::Any], |_| Err(InteropError::host("second")))
            .build()
    }

    fn overloads(class: &HostClass, name: &str) -> Vec<Arc<Callable>> {
        class
            .methods()
            .iter()
            .filter(|m| m.name() == name)
            .cloned()
            .collect()
    }

    #[test]
    fn test_zero_arguments_prefer_exact_arity() {
        let engine = InMemoryEngine::new();
        let bridge = Bridge::new();
        let cx = Invocation::new(&engine, &bridge, "pick");
        let class = calc();
        let picks = overloads(&class, "pick");

        assert_eq!(score(&picks[0], &[], &cx).unwrap(), 1.0);
        assert_eq!(score(&picks[1], &[], &cx).unwrap(), 0.99);
        assert_eq!(execute(&picks, &[], &cx).unwrap(), HostValue::from("none"));
    }

    #[test]
    fn test_exact_engine_kind_beats_widening() {
        let engine = InMemoryEngine::new();
        let bridge = Bridge::new();
        let cx = Invocation::new(&engine, &bridge, "half");
        let class = calc();
        let halves = overloads(&class, "half");

        let ints = virtual_arguments(&[ScriptValue::Integer(5)]);
        let ranked = rank(&halves, &ints, &cx).unwrap();
        assert_eq!(ranked[0].score, 1.0);
        assert_eq!(ranked[1].score, 0.7);
        assert_eq!(execute(&halves, &ints, &cx).unwrap(), HostValue::Int(2));

        let doubles = virtual_arguments(&[ScriptValue::Double(5.0)]);
        assert_eq!(execute(&halves, &doubles, &cx).unwrap(), HostValue::Double(2.5));
    }

    #[test]
    fn test_variadic_tail_is_packed() {
        let engine = InMemoryEngine::new();
        let bridge = Bridge::new();
        let cx = Invocation::new(&engine, &bridge, "pick");
        let class = calc();
        let picks = overloads(&class, "pick");

        let args = virtual_arguments(&[ScriptValue::Integer(1), ScriptValue::Integer(2)]);
        assert_eq!(score(&picks[1], &args, &cx).unwrap(), 0.95);
        assert_eq!(execute(&picks, &args, &cx).unwrap(), HostValue::Int(2));
    }

    #[test]
    fn test_null_excludes_primitive_parameters() {
        let engine = InMemoryEngine::new();
        let bridge = Bridge::new();
        let cx = Invocation::new(&engine, &bridge, "half");
        let class = calc();
        let halves = overloads(&class, "half");

        let args = virtual_arguments(&[ScriptValue::Null]);
        assert!(rank(&halves, &args, &cx).unwrap().is_empty());
        assert!(matches!(
            execute(&halves, &args, &cx),
            Err(InteropError::NoViableOverload { .. })
        ));
    }

    #[test]
    fn test_last_failure_is_wrapped() {
        let engine = InMemoryEngine::new();
        let bridge = Bridge::new();
        let cx = Invocation::new(&engine, &bridge, "fail");
        let class = calc();
        let fails = overloads(&class, "fail");

        let args = vec![VirtualArgument::from_host(HostValue::Int(1))];
        let err = execute(&fails, &args, &cx).unwrap_err();
        assert_eq!(
            err,
            InteropError::InvocationFailure {
                member: "fail".to_string(),
                message: "second".to_string(),
            }
        );
    }

    #[test]
    fn test_fallback_follows_ranking() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let (first, second) = (attempts.clone(), attempts.clone());
        let class = HostClass::builder::<Calc>("Calc")
            .static_method("parse", [HostType::Any], move |_| {
                first.lock().push("any");
                Ok("any".into())
            })
            .static_method("parse", [HostType::Int], move |_| {
                second.lock().push("int");
                Err(InteropError::host("overflow"))
            })
            .build();

        let engine = InMemoryEngine::new();
        let bridge = Bridge::new();
        let cx = Invocation::new(&engine, &bridge, "parse");
        let args = virtual_arguments(&[ScriptValue::Integer(7)]);
        let parses = overloads(&class, "parse");

        assert_eq!(execute(&parses, &args, &cx).unwrap(), HostValue::from("any"));
        assert_eq!(*attempts.lock(), ["int", "any"]);
    }

    #[test]
    fn test_try_in_order_stops_on_conversion_failure() {
        let mut attempts = 0;
        let result: Result<(), _> = try_in_order([1, 2, 3], |n| {
            attempts += 1;
            if n == 2 {
                Err(InteropError::conversion("bad"))
            } else {
                Err(InteropError::host("boom"))
            }
        });
        assert_eq!(attempts, 2);
        assert_eq!(result, Err(Some(InteropError::conversion("bad"))));

        let empty: Result<(), _> = try_in_order(Vec::<i32>::new(), |_| Ok(()));
        assert_eq!(empty, Err(None));
    }
}
