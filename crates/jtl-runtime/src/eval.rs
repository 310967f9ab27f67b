//! Expression evaluation and calls.
//!
//! Macros are dynamically scoped. A macro body runs with its parameter
//! frame pushed on top of whatever scopes are active at the call site, so
//! free names inside the body resolve against the caller's variables, not
//! against the scope the macro was defined in. Parameter defaults are
//! evaluated the same way, before the parameter frame is pushed. Templates
//! rely on this; do not turn it into closure capture.

use std::sync::Arc;

use jtl_source::Span;
use jtl_templates::ast::Binary;
use jtl_templates::ast::BinaryOp;
use jtl_templates::ast::Call;
use jtl_templates::ast::Expr;
use jtl_templates::ast::FilterCall;
use jtl_templates::ast::LiteralValue;
use jtl_templates::ast::Param;
use jtl_templates::ast::Test;
use jtl_templates::ast::Unary;
use jtl_templates::ast::UnaryOp;

use crate::error::RenderError;
use crate::ops;
use crate::renderer::CallerFrame;
use crate::renderer::MacroRef;
use crate::renderer::Renderer;
use crate::renderer::MAX_CALL_DEPTH;
use crate::value::Kwargs;
use crate::value::Map;
use crate::value::Value;

impl Renderer<'_> {
    pub(crate) fn eval(&mut self, expr: &Expr) -> Value {
        match expr {
            Expr::Literal(literal) => literal_value(&literal.value),
            Expr::Name(name) => self.lookup(&name.name, name.span),
            Expr::Group(group) => self.eval(&group.expr),
            Expr::Unary(unary) => self.eval_unary(unary),
            Expr::Binary(binary) => self.eval_binary(binary),
            Expr::Membership(membership) => {
                let element = self.eval(&membership.element);
                let container = self.eval(&membership.container);
                match ops::contains(&element, &container) {
                    Ok(found) => Value::Bool(found != membership.negated),
                    Err(error) => {
                        self.report(error, membership.span);
                        Value::Nil
                    }
                }
            }
            Expr::Conditional(conditional) => {
                if self.eval(&conditional.test).is_truthy() {
                    self.eval(&conditional.then)
                } else {
                    match &conditional.otherwise {
                        Some(otherwise) => self.eval(otherwise),
                        None => Value::Nil,
                    }
                }
            }
            Expr::Call(call) => self.eval_call(call, None),
            Expr::Filter(filter) => {
                let value = self.eval(&filter.value);
                self.apply_filter(value, &filter.call)
            }
            Expr::Test(test) => Value::Bool(self.eval_test(test)),
            Expr::Attribute(attribute) => {
                let base = self.eval(&attribute.value);
                self.get_attr(&base, &attribute.attr, attribute.span)
            }
            Expr::Item(item) => {
                let base = self.eval(&item.value);
                let index = self.eval(&item.index);
                self.get_item(&base, &index, item.span)
            }
            Expr::List(list) => Value::Seq(self.eval_all(&list.items)),
            Expr::Tuple(tuple) => Value::Seq(self.eval_all(&tuple.items)),
            Expr::Dict(dict) => {
                let mut map = Map::new();
                for (key, value) in &dict.entries {
                    let key = self.eval(key).to_string();
                    let value = self.eval(value);
                    map.insert(key, value);
                }
                Value::Map(map)
            }
            Expr::Kwarg(kwarg) => self.eval(&kwarg.value),
            Expr::Missing(_) => Value::Nil,
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Vec<Value> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    /// Split call arguments into positional values and keyword arguments.
    pub(crate) fn eval_args(&mut self, args: &[Expr]) -> (Vec<Value>, Kwargs) {
        let mut positional = Vec::new();
        let mut kwargs = Kwargs::new();
        for arg in args {
            match arg {
                Expr::Kwarg(kwarg) => {
                    let value = self.eval(&kwarg.value);
                    kwargs.insert(kwarg.name.clone(), value);
                }
                other => positional.push(self.eval(other)),
            }
        }
        (positional, kwargs)
    }

    /// Resolve a name against the scopes, then the environment globals.
    pub(crate) fn lookup(&mut self, name: &str, span: Span) -> Value {
        if let Some(value) = self.resolve(name) {
            return value;
        }
        if self.env.strict().undefined {
            self.report(
                RenderError::UnknownVariable {
                    name: name.to_string(),
                },
                span,
            );
        }
        Value::Nil
    }

    /// Like [`Renderer::lookup`], without reporting.
    pub(crate) fn resolve(&self, name: &str) -> Option<Value> {
        self.scopes
            .get(name)
            .or_else(|| self.env.global(name))
            .cloned()
    }

    fn get_attr(&mut self, base: &Value, attr: &str, span: Span) -> Value {
        if let Some(value) = base.get_attr(attr) {
            return value;
        }
        if self.env.strict().undefined && !base.is_nil() {
            self.report(
                RenderError::UnknownAttribute {
                    type_name: base.type_name().to_string(),
                    attr: attr.to_string(),
                },
                span,
            );
        }
        Value::Nil
    }

    fn get_item(&mut self, base: &Value, index: &Value, span: Span) -> Value {
        if let Some(value) = base.get_item(index) {
            return value;
        }
        if self.env.strict().undefined && !base.is_nil() {
            self.report(
                RenderError::UnknownItem {
                    type_name: base.type_name().to_string(),
                    index: index.to_string(),
                },
                span,
            );
        }
        Value::Nil
    }

    #[allow(clippy::cast_precision_loss)]
    fn eval_unary(&mut self, unary: &Unary) -> Value {
        let operand = self.eval(&unary.operand);
        let result = match (unary.op, operand) {
            (UnaryOp::Not, operand) => Ok(Value::Bool(!operand.is_truthy())),
            (UnaryOp::Neg, Value::Int(i)) => Ok(i
                .checked_neg()
                .map_or(Value::Float(-(i as f64)), Value::Int)),
            (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
            (UnaryOp::Neg, Value::Bool(b)) => Ok(Value::Int(-i64::from(b))),
            (UnaryOp::Pos, Value::Bool(b)) => Ok(Value::Int(i64::from(b))),
            (UnaryOp::Pos, number @ (Value::Int(_) | Value::Float(_))) => Ok(number),
            (op, operand) => Err(RenderError::InvalidUnaryOperand {
                op: if op == UnaryOp::Neg { "-" } else { "+" }.to_string(),
                operand: operand.type_name().to_string(),
            }),
        };
        result.unwrap_or_else(|error| {
            self.report(error, unary.span);
            Value::Nil
        })
    }

    fn eval_binary(&mut self, binary: &Binary) -> Value {
        let left = self.eval(&binary.left);
        match binary.op {
            BinaryOp::And if !left.is_truthy() => left,
            BinaryOp::Or if left.is_truthy() => left,
            BinaryOp::And | BinaryOp::Or => self.eval(&binary.right),
            op => {
                let right = self.eval(&binary.right);
                ops::binary(op, &left, &right).unwrap_or_else(|error| {
                    self.report(error, binary.span);
                    Value::Nil
                })
            }
        }
    }

    pub(crate) fn apply_filter(&mut self, value: Value, call: &FilterCall) -> Value {
        let (args, kwargs) = self.eval_args(&call.args);
        let env = self.env;
        match env.filter(&call.name) {
            Some(filter) => filter(&value, &args, &kwargs).unwrap_or_else(|reason| {
                self.report(
                    RenderError::CallFailed {
                        name: call.name.clone(),
                        reason,
                    },
                    call.span,
                );
                Value::Nil
            }),
            None => {
                if env.strict().filters {
                    self.report(
                        RenderError::UnknownFilter {
                            name: call.name.clone(),
                        },
                        call.span,
                    );
                }
                value
            }
        }
    }

    pub(crate) fn apply_filters(&mut self, value: Value, filters: &[FilterCall]) -> Value {
        filters
            .iter()
            .fold(value, |value, filter| self.apply_filter(value, filter))
    }

    /// `value is [not] name(args)`, with `defined`/`undefined` answered from
    /// the lookup itself.
    fn eval_test(&mut self, test: &Test) -> bool {
        let result = match test.name.as_str() {
            "defined" => self.is_defined(&test.value),
            "undefined" => !self.is_defined(&test.value),
            name => {
                let value = self.eval(&test.value);
                let (args, kwargs) = self.eval_args(&test.args);
                let env = self.env;
                match env.test(name) {
                    Some(function) => function(&value, &args, &kwargs).unwrap_or_else(|reason| {
                        self.report(
                            RenderError::CallFailed {
                                name: name.to_string(),
                                reason,
                            },
                            test.span,
                        );
                        false
                    }),
                    None => {
                        if env.strict().tests {
                            self.report(
                                RenderError::UnknownTest {
                                    name: name.to_string(),
                                },
                                test.span,
                            );
                        }
                        false
                    }
                }
            }
        };
        result != test.negated
    }

    fn is_defined(&mut self, expr: &Expr) -> bool {
        match expr {
            Expr::Name(name) => {
                self.resolve(&name.name).is_some()
                    || self.macros.contains_key(&name.name)
                    || self.namespaces.contains_key(&name.name)
            }
            _ => self.resolve_path(expr).is_some(),
        }
    }

    /// Evaluate a name/attribute/item chain without reporting, stopping at
    /// the first missing step.
    fn resolve_path(&mut self, expr: &Expr) -> Option<Value> {
        match expr {
            Expr::Name(name) => self.resolve(&name.name),
            Expr::Group(group) => self.resolve_path(&group.expr),
            Expr::Attribute(attribute) => self
                .resolve_path(&attribute.value)?
                .get_attr(&attribute.attr),
            Expr::Item(item) => {
                let base = self.resolve_path(&item.value)?;
                let index = self.eval(&item.index);
                base.get_item(&index)
            }
            other => Some(self.eval(other)),
        }
    }

    /// Evaluate a call. `caller` is set when the call comes from a `{% call %}` block.
    pub(crate) fn eval_call(&mut self, call: &Call, caller: Option<CallerFrame>) -> Value {
        match call.callee.as_ref() {
            Expr::Name(callee) => self.call_name(&callee.name, &call.args, caller, call.span),
            Expr::Attribute(attribute) => {
                if let Expr::Name(base) = attribute.value.as_ref() {
                    let namespace = if self.scopes.contains(&base.name) {
                        None
                    } else {
                        self.namespaces.get(&base.name).cloned()
                    };
                    if let Some(table) = namespace {
                        let Some(definition) = table.get(&attribute.attr).cloned() else {
                            self.report(
                                RenderError::UnknownMacro {
                                    name: format!("{}.{}", base.name, attribute.attr),
                                },
                                attribute.span,
                            );
                            return Value::Nil;
                        };
                        let target = MacroRef {
                            definition,
                            home: table,
                        };
                        let (args, kwargs) = self.eval_args(&call.args);
                        return self.call_macro(&target, args, kwargs, caller, call.span);
                    }
                }
                let object = self.eval(&attribute.value);
                let (args, kwargs) = self.eval_args(&call.args);
                self.call_method(&object, &attribute.attr, &args, &kwargs, call.span)
            }
            other => {
                let callee = self.eval(other);
                self.report(
                    RenderError::NotCallable {
                        type_name: callee.type_name().to_string(),
                    },
                    call.span,
                );
                Value::Nil
            }
        }
    }

    /// Resolve a bare callee: `caller`, `super`, macros, registered functions.
    fn call_name(
        &mut self,
        name: &str,
        args: &[Expr],
        caller: Option<CallerFrame>,
        span: Span,
    ) -> Value {
        if name == "caller" {
            if let Some(Some(frame)) = self.callers.last().cloned() {
                let (args, kwargs) = self.eval_args(args);
                return self.call_caller(frame, args, kwargs, span);
            }
        }
        if name == "super" {
            return self.call_super(span);
        }
        if let Some(target) = self.find_macro(name) {
            let (args, kwargs) = self.eval_args(args);
            return self.call_macro(&target, args, kwargs, caller, span);
        }

        let (args, kwargs) = self.eval_args(args);
        let env = self.env;
        if let Some(function) = env.function(name) {
            return function(&args, &kwargs).unwrap_or_else(|reason| {
                self.report(
                    RenderError::CallFailed {
                        name: name.to_string(),
                        reason,
                    },
                    span,
                );
                Value::Nil
            });
        }
        if let Some(value) = self.resolve(name) {
            self.report(
                RenderError::NotCallable {
                    type_name: value.type_name().to_string(),
                },
                span,
            );
        } else if env.strict().functions {
            self.report(
                RenderError::UnknownFunction {
                    name: name.to_string(),
                },
                span,
            );
        }
        Value::Nil
    }

    /// The executing macro's siblings shadow the flat table.
    fn find_macro(&self, name: &str) -> Option<MacroRef> {
        if let Some(home) = self.macro_homes.last() {
            if let Some(definition) = home.get(name) {
                return Some(MacroRef {
                    definition: Arc::clone(definition),
                    home: Arc::clone(home),
                });
            }
        }
        self.macros.get(name).cloned()
    }

    fn call_method(
        &mut self,
        object: &Value,
        name: &str,
        args: &[Value],
        kwargs: &Kwargs,
        span: Span,
    ) -> Value {
        if let Value::Object(host) = object {
            if let Some(result) = host.call_method(name, args, kwargs) {
                return result.unwrap_or_else(|reason| {
                    self.report(
                        RenderError::CallFailed {
                            name: format!("{}.{name}", host.type_name()),
                            reason,
                        },
                        span,
                    );
                    Value::Nil
                });
            }
        }
        match object.get_attr(name) {
            Some(value) => self.report(
                RenderError::NotCallable {
                    type_name: value.type_name().to_string(),
                },
                span,
            ),
            None if self.env.strict().functions => self.report(
                RenderError::UnknownFunction {
                    name: format!("{}.{name}", object.type_name()),
                },
                span,
            ),
            None => {}
        }
        Value::Nil
    }

    /// Invoke a macro and return its rendered body.
    ///
    /// The body sees the call site's scopes underneath its parameters. See
    /// the module docs.
    pub(crate) fn call_macro(
        &mut self,
        target: &MacroRef,
        args: Vec<Value>,
        kwargs: Kwargs,
        caller: Option<CallerFrame>,
        span: Span,
    ) -> Value {
        if self.call_depth >= MAX_CALL_DEPTH {
            self.report(
                RenderError::RecursionLimit {
                    depth: MAX_CALL_DEPTH,
                },
                span,
            );
            return Value::Nil;
        }
        let definition = Arc::clone(&target.definition);
        let frame = self.bind_params(&definition.name, &definition.params, args, kwargs, span);

        self.call_depth += 1;
        self.callers.push(caller);
        self.macro_homes.push(Arc::clone(&target.home));
        let body = self.scoped(frame, |r| r.render_to_string(&definition.body));
        self.macro_homes.pop();
        self.callers.pop();
        self.call_depth -= 1;

        Value::String(body)
    }

    /// `caller(...)` inside a macro invoked from a `{% call %}` block.
    ///
    /// The block body runs at the call site, so the current caller frame and
    /// macro siblings are set aside while it renders.
    fn call_caller(
        &mut self,
        frame: CallerFrame,
        args: Vec<Value>,
        kwargs: Kwargs,
        span: Span,
    ) -> Value {
        let block = match frame {
            CallerFrame::Rendered(body) => return Value::String(body),
            CallerFrame::Deferred(block) => block,
        };
        if self.call_depth >= MAX_CALL_DEPTH {
            self.report(
                RenderError::RecursionLimit {
                    depth: MAX_CALL_DEPTH,
                },
                span,
            );
            return Value::Nil;
        }
        let bound = self.bind_params("caller", &block.caller_params, args, kwargs, span);

        let saved_caller = self.callers.pop();
        let saved_home = self.macro_homes.pop();
        self.call_depth += 1;
        let body = self.scoped(bound, |r| r.render_to_string(&block.body));
        self.call_depth -= 1;
        if let Some(home) = saved_home {
            self.macro_homes.push(home);
        }
        if let Some(caller) = saved_caller {
            self.callers.push(caller);
        }

        Value::String(body)
    }

    /// Bind arguments positionally, then by keyword, then by default.
    ///
    /// Surplus positional arguments land in `varargs` and surplus keywords
    /// in `kwargs`.
    fn bind_params(
        &mut self,
        owner: &str,
        params: &[Param],
        args: Vec<Value>,
        mut kwargs: Kwargs,
        span: Span,
    ) -> Map {
        let mut positional = args.into_iter();
        let mut frame = Map::new();
        for param in params {
            let value = if let Some(value) = positional.next() {
                if kwargs.shift_remove(&param.name).is_some() {
                    self.report(
                        RenderError::CallFailed {
                            name: owner.to_string(),
                            reason: format!("got multiple values for argument '{}'", param.name),
                        },
                        span,
                    );
                }
                value
            } else if let Some(value) = kwargs.shift_remove(&param.name) {
                value
            } else if let Some(default) = &param.default {
                self.eval(default)
            } else {
                Value::Nil
            };
            frame.insert(param.name.clone(), value);
        }
        frame.insert("varargs".to_string(), Value::Seq(positional.collect()));
        frame.insert("kwargs".to_string(), Value::Map(kwargs));
        frame
    }
}

fn literal_value(literal: &LiteralValue) -> Value {
    match literal {
        LiteralValue::None => Value::Nil,
        LiteralValue::Bool(b) => Value::Bool(*b),
        LiteralValue::Int(i) => Value::Int(*i),
        LiteralValue::Float(f) => Value::Float(*f),
        LiteralValue::Str(s) => Value::String(s.clone()),
    }
}
