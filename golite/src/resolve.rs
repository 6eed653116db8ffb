//! Static checks run before a program is published
//!
//! Every name, package member, type expression and composite literal shape
//! is verified here so that a bad module fails to load rather than failing
//! on its first call. Value types are not tracked; type mismatches that
//! need them surface at run time.

use std::collections::HashSet;

use crate::ast::{Block, CaseClause, Element, Expr, Stmt, TypeExpr, UnaryOp};
use crate::error::{GoError, Pos, Result};
use crate::program::{FuncDef, Program};
use crate::stack::ensure_sufficient_stack;
use crate::stdlib::Member;
use crate::types::Type;

pub(crate) const BUILTINS: &[&str] = &["len", "append", "make", "new", "delete", "panic"];

/// What a bare identifier refers to.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Name {
    Local,
    Const,
    Func(usize),
    Type(Type),
    Builtin(&'static str),
    Package,
    Literal,
}

/// Identifier lookup shared with the evaluator; locals are checked by the
/// caller first.
pub(crate) fn global_name(program: &Program, name: &str) -> Option<Name> {
    if program.consts.contains_key(name) {
        return Some(Name::Const);
    }
    if let Some(&index) = program.func_index.get(name) {
        return Some(Name::Func(index));
    }
    if let Some(ty) = program.named_type(name) {
        return Some(Name::Type(ty));
    }
    if program.imports.contains_key(name) {
        return Some(Name::Package);
    }
    if let Some(b) = BUILTINS.iter().find(|b| **b == name) {
        return Some(Name::Builtin(b));
    }
    match name {
        "true" | "false" | "nil" => Some(Name::Literal),
        _ => None,
    }
}

pub fn check(program: &Program) -> Result<()> {
    for func in &program.funcs {
        Checker::new(program, func).check_func()?;
    }
    Ok(())
}

struct Checker<'a> {
    program: &'a Program,
    func: &'a FuncDef,
    scopes: Vec<HashSet<String>>,
    loops: usize,
    breakable: usize,
}

impl<'a> Checker<'a> {
    fn new(program: &'a Program, func: &'a FuncDef) -> Self {
        Self {
            program,
            func,
            scopes: Vec::new(),
            loops: 0,
            breakable: 0,
        }
    }

    fn check_func(&mut self) -> Result<()> {
        let mut top = HashSet::new();
        for name in self.func.params.iter().chain(&self.func.results).flatten() {
            if name != "_" && !top.insert(name.clone()) {
                return Err(GoError::resolve(
                    self.func.pos,
                    format!("duplicate argument {}", name),
                ));
            }
        }
        self.scopes.push(top);
        let func = self.func;
        self.block(&func.body)?;
        self.scopes.pop();

        if func.ty.num_out() > 0 && !block_terminates(&func.body) {
            return Err(GoError::resolve(
                func.pos,
                format!("missing return in {}", func.name),
            ));
        }
        Ok(())
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|s| s.contains(name))
    }

    fn lookup(&self, name: &str) -> Option<Name> {
        if self.is_local(name) {
            return Some(Name::Local);
        }
        global_name(self.program, name)
    }

    fn declare(&mut self, name: &str) {
        if name == "_" {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.scopes.push(HashSet::new());
        let out = f(self);
        self.scopes.pop();
        out
    }

    fn block(&mut self, block: &Block) -> Result<()> {
        self.scoped(|c| c.stmts(&block.stmts))
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        ensure_sufficient_stack(|| self.check_stmt(stmt))
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Var {
                names,
                ty,
                values,
                pos,
            } => {
                let ty = ty.as_ref().map(|t| self.type_expr(t)).transpose()?;
                for value in values {
                    self.expr_with(value, ty.as_ref())?;
                }
                if !values.is_empty() {
                    self.check_counts(names.len(), values, *pos)?;
                }
                for name in names {
                    self.declare_unique(name, *pos)?;
                }
                Ok(())
            }
            Stmt::Define { names, values, pos } => {
                for value in values {
                    self.expr(value)?;
                }
                self.check_counts(names.len(), values, *pos)?;
                let current = self.scopes.last().cloned().unwrap_or_default();
                let fresh = names
                    .iter()
                    .filter(|n| *n != "_" && !current.contains(n.as_str()))
                    .count();
                if fresh == 0 {
                    return Err(GoError::resolve(
                        *pos,
                        "no new variables on left side of :=",
                    ));
                }
                let mut seen = HashSet::new();
                for name in names {
                    if name != "_" && !seen.insert(name) {
                        return Err(GoError::resolve(
                            *pos,
                            format!("{} repeated on left side of :=", name),
                        ));
                    }
                    self.declare(name);
                }
                Ok(())
            }
            Stmt::Assign {
                targets,
                values,
                pos,
                ..
            } => {
                for target in targets {
                    self.assign_target(target)?;
                }
                for value in values {
                    self.expr(value)?;
                }
                self.check_counts(targets.len(), values, *pos)
            }
            Stmt::IncDec { target, .. } => self.assign_target(target),
            Stmt::Expr(expr) => {
                if !matches!(expr, Expr::Call { .. }) {
                    return Err(GoError::resolve(
                        expr.pos(),
                        format!("{} is not used", describe(expr)),
                    ));
                }
                if let Expr::Call { func, .. } = expr {
                    if let Expr::Ident(name, pos) = &**func {
                        match self.lookup(name) {
                            Some(Name::Type(_)) => {
                                return Err(GoError::resolve(
                                    *pos,
                                    format!("{}(...) (value of type {}) is not used", name, name),
                                ))
                            }
                            Some(Name::Builtin(b @ ("len" | "append" | "make" | "new"))) => {
                                return Err(GoError::resolve(
                                    *pos,
                                    format!("{}(...) (value) is not used", b),
                                ))
                            }
                            _ => {}
                        }
                    }
                }
                self.expr(expr)
            }
            Stmt::Return { values, pos } => self.check_return(values, *pos),
            Stmt::If {
                init,
                cond,
                then,
                els,
                ..
            } => self.scoped(|c| {
                if let Some(init) = init {
                    c.stmt(init)?;
                }
                c.expr(cond)?;
                c.block(then)?;
                if let Some(els) = els {
                    c.stmt(els)?;
                }
                Ok(())
            }),
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => self.scoped(|c| {
                if let Some(init) = init {
                    c.stmt(init)?;
                }
                if let Some(cond) = cond {
                    c.expr(cond)?;
                }
                if let Some(post) = post {
                    if matches!(**post, Stmt::Define { .. }) {
                        return Err(GoError::resolve(
                            post_pos(post),
                            "cannot declare in post statement of for loop",
                        ));
                    }
                    c.stmt(post)?;
                }
                c.loop_body(body)
            }),
            Stmt::Range {
                key,
                value,
                define,
                expr,
                body,
                pos,
            } => self.scoped(|c| {
                c.expr(expr)?;
                for target in [key, value].into_iter().flatten() {
                    if *define {
                        let Expr::Ident(name, _) = target else {
                            return Err(GoError::resolve(
                                *pos,
                                format!("non-name {} on left side of :=", describe(target)),
                            ));
                        };
                        c.declare(name);
                    } else {
                        c.assign_target(target)?;
                    }
                }
                c.loop_body(body)
            }),
            Stmt::Switch {
                init, tag, cases, ..
            } => self.scoped(|c| {
                if let Some(init) = init {
                    c.stmt(init)?;
                }
                if let Some(tag) = tag {
                    c.expr(tag)?;
                }
                c.cases(cases)
            }),
            Stmt::Block(block) => self.block(block),
            Stmt::Break(pos) => {
                if self.breakable == 0 {
                    return Err(GoError::resolve(
                        *pos,
                        "break is not in a loop, switch, or select",
                    ));
                }
                Ok(())
            }
            Stmt::Continue(pos) => {
                if self.loops == 0 {
                    return Err(GoError::resolve(*pos, "continue is not in a loop"));
                }
                Ok(())
            }
        }
    }

    fn declare_unique(&mut self, name: &str, pos: Pos) -> Result<()> {
        if name != "_"
            && self
                .scopes
                .last()
                .is_some_and(|scope| scope.contains(name))
        {
            return Err(GoError::resolve(
                pos,
                format!("{} redeclared in this block", name),
            ));
        }
        self.declare(name);
        Ok(())
    }

    fn loop_body(&mut self, body: &Block) -> Result<()> {
        self.loops += 1;
        self.breakable += 1;
        let out = self.block(body);
        self.loops -= 1;
        self.breakable -= 1;
        out
    }

    fn cases(&mut self, cases: &[CaseClause]) -> Result<()> {
        let mut default_seen = false;
        self.breakable += 1;
        let out = (|| {
            for case in cases {
                if case.is_default {
                    if default_seen {
                        return Err(GoError::resolve(
                            case.pos,
                            "multiple defaults in switch",
                        ));
                    }
                    default_seen = true;
                }
                for expr in &case.exprs {
                    self.expr(expr)?;
                }
                self.scoped(|c| c.stmts(&case.body))?;
            }
            Ok(())
        })();
        self.breakable -= 1;
        out
    }

    fn assign_target(&mut self, target: &Expr) -> Result<()> {
        match target {
            Expr::Ident(name, pos) => match self.lookup(name) {
                _ if name == "_" => Ok(()),
                Some(Name::Local) => Ok(()),
                Some(Name::Const) | Some(Name::Literal) => Err(GoError::resolve(
                    *pos,
                    format!("cannot assign to {} (neither addressable nor a map index expression)", name),
                )),
                Some(_) => Err(GoError::resolve(
                    *pos,
                    format!("cannot assign to {}", name),
                )),
                None => Err(GoError::resolve(*pos, format!("undefined: {}", name))),
            },
            Expr::Index { .. } | Expr::Selector { .. } => self.expr(target),
            Expr::Unary {
                op: UnaryOp::Deref,
                ..
            } => self.expr(target),
            other => Err(GoError::resolve(
                other.pos(),
                format!("cannot assign to {}", describe(other)),
            )),
        }
    }

    /// Count check for `lhs = values`, allowing one multi-value call or a
    /// comma-ok map index on the right.
    fn check_counts(&self, lhs: usize, values: &[Expr], pos: Pos) -> Result<()> {
        if values.len() == lhs {
            if let Some(call) = values.iter().find(|v| self.result_count(v).is_some_and(|n| n != 1)) {
                let n = self.result_count(call).unwrap_or(1);
                return Err(GoError::resolve(
                    call.pos(),
                    format!("multiple-value {} (value of {} results) in single-value context", describe(call), n),
                ));
            }
            return Ok(());
        }
        if values.len() == 1 {
            let value = &values[0];
            match self.result_count(value) {
                Some(n) if n == lhs => return Ok(()),
                Some(n) => {
                    return Err(GoError::resolve(
                        pos,
                        format!(
                            "assignment mismatch: {} variable{} but {} returns {} value{}",
                            lhs,
                            plural(lhs),
                            describe(value),
                            n,
                            plural(n)
                        ),
                    ))
                }
                None if lhs == 2 && matches!(value, Expr::Index { .. }) => return Ok(()),
                None if matches!(value, Expr::Call { .. }) => return Ok(()),
                None => {}
            }
        }
        Err(GoError::resolve(
            pos,
            format!(
                "assignment mismatch: {} variable{} but {} value{}",
                lhs,
                plural(lhs),
                values.len(),
                plural(values.len())
            ),
        ))
    }

    /// Number of results of a call to a package function, when known.
    fn result_count(&self, expr: &Expr) -> Option<usize> {
        let Expr::Call { func, .. } = expr else {
            return None;
        };
        let Expr::Ident(name, _) = &**func else {
            return None;
        };
        match self.lookup(name)? {
            Name::Func(index) => self.program.func(index).map(|f| f.ty.num_out()),
            _ => None,
        }
    }

    fn check_return(&mut self, values: &[Expr], pos: Pos) -> Result<()> {
        let func = self.func;
        let want = func.ty.num_out();
        for (i, value) in values.iter().enumerate() {
            self.expr_with(value, func.ty.results.get(i))?;
        }
        let named = func.results.iter().any(Option::is_some);
        if values.is_empty() && (want == 0 || named) {
            return Ok(());
        }
        if values.len() == 1 && want != 1 {
            if let Some(n) = self.result_count(&values[0]) {
                if n == want {
                    return Ok(());
                }
            } else if matches!(values[0], Expr::Call { .. }) && want > 1 {
                return Ok(());
            }
        }
        if values.len() < want {
            return Err(GoError::resolve(pos, "not enough return values"));
        }
        if values.len() > want {
            return Err(GoError::resolve(pos, "too many return values"));
        }
        Ok(())
    }

    fn type_expr(&self, expr: &TypeExpr) -> Result<Type> {
        if let TypeExpr::Name(name, pos) = expr {
            if self.is_local(name) {
                return Err(GoError::resolve(*pos, format!("{} is not a type", name)));
            }
        }
        self.program.resolve_type(expr)
    }

    fn expr(&mut self, expr: &Expr) -> Result<()> {
        self.expr_with(expr, None)
    }

    /// Checks `expr`; `expected` is the type an elided composite literal
    /// takes in this position.
    fn expr_with(&mut self, expr: &Expr, expected: Option<&Type>) -> Result<()> {
        ensure_sufficient_stack(|| self.check_expr(expr, expected))
    }

    fn check_expr(&mut self, expr: &Expr, expected: Option<&Type>) -> Result<()> {
        match expr {
            Expr::Int(..) | Expr::Float(..) | Expr::Str(..) => Ok(()),
            Expr::Ident(name, pos) => match self.lookup(name) {
                _ if name == "_" => Err(GoError::resolve(
                    *pos,
                    "cannot use _ as value",
                )),
                Some(Name::Package) => Err(GoError::resolve(
                    *pos,
                    format!("use of package {} without selector", name),
                )),
                Some(Name::Type(_)) => Err(GoError::resolve(
                    *pos,
                    format!("{} (type) is not an expression", name),
                )),
                Some(Name::Builtin(b)) => Err(GoError::resolve(
                    *pos,
                    format!("{} (built-in function) must be called", b),
                )),
                Some(_) => Ok(()),
                None => Err(GoError::resolve(*pos, format!("undefined: {}", name))),
            },
            Expr::Unary { op, expr, .. } => {
                if *op == UnaryOp::Addr {
                    let inner = expected.and_then(|t| match t {
                        Type::Pointer(elem) => Some(&**elem),
                        _ => None,
                    });
                    return self.expr_with(expr, inner);
                }
                self.expr(expr)
            }
            Expr::Binary { lhs, rhs, .. } => {
                self.expr(lhs)?;
                self.expr(rhs)
            }
            Expr::Call {
                func,
                args,
                spread,
                pos,
            } => self.call(func, args, *spread, *pos),
            Expr::Selector { expr, name, pos } => {
                if let Expr::Ident(pkg, _) = &**expr {
                    if self.lookup(pkg) == Some(Name::Package) {
                        let package = &self.program.imports[pkg.as_str()];
                        return match package.member(name) {
                            Some(_) => Ok(()),
                            None => Err(GoError::resolve(
                                *pos,
                                format!("undefined: {}.{}", pkg, name),
                            )),
                        };
                    }
                }
                self.expr(expr)
            }
            Expr::Index { expr, index, .. } => {
                self.expr(expr)?;
                self.expr(index)
            }
            Expr::SliceExpr { expr, lo, hi, .. } => {
                self.expr(expr)?;
                for bound in [lo, hi].into_iter().flatten() {
                    self.expr(bound)?;
                }
                Ok(())
            }
            Expr::Composite { ty, elems, pos } => {
                let ty = match ty {
                    Some(t) => self.type_expr(t)?,
                    None => match expected {
                        Some(Type::Pointer(elem)) => (**elem).clone(),
                        Some(t) => t.clone(),
                        None => {
                            return Err(GoError::resolve(
                                *pos,
                                "invalid composite literal type: missing type",
                            ))
                        }
                    },
                };
                self.composite(&ty, elems, *pos)
            }
            Expr::Type(_, pos) => Err(GoError::resolve(*pos, "type is not an expression")),
        }
    }

    fn composite(&mut self, ty: &Type, elems: &[Element], pos: Pos) -> Result<()> {
        match ty {
            Type::Struct(st) => {
                let keyed = elems.iter().filter(|e| e.key.is_some()).count();
                if keyed != 0 && keyed != elems.len() {
                    return Err(GoError::resolve(
                        pos,
                        "mixture of field:value and value elements in struct literal",
                    ));
                }
                if keyed == 0 && !elems.is_empty() {
                    if elems.len() < st.fields.len() {
                        return Err(GoError::resolve(pos, format!("too few values in struct literal of type {}", ty)));
                    }
                    if elems.len() > st.fields.len() {
                        return Err(GoError::resolve(pos, format!("too many values in struct literal of type {}", ty)));
                    }
                }
                let mut seen = HashSet::new();
                for (i, elem) in elems.iter().enumerate() {
                    let field = match &elem.key {
                        Some(Expr::Ident(name, key_pos)) => {
                            let index = st.field_index(name).ok_or_else(|| {
                                GoError::resolve(
                                    *key_pos,
                                    format!("unknown field {} in struct literal of type {}", name, ty),
                                )
                            })?;
                            if !seen.insert(index) {
                                return Err(GoError::resolve(
                                    *key_pos,
                                    format!("duplicate field name {} in struct literal", name),
                                ));
                            }
                            &st.fields[index]
                        }
                        Some(other) => {
                            return Err(GoError::resolve(
                                other.pos(),
                                format!("invalid field name {} in struct literal", describe(other)),
                            ))
                        }
                        None => &st.fields[i],
                    };
                    self.expr_with(&elem.value, Some(&field.ty))?;
                }
                Ok(())
            }
            Type::Slice(elem_ty) => {
                for elem in elems {
                    if let Some(key) = &elem.key {
                        self.expr(key)?;
                    }
                    self.expr_with(&elem.value, Some(elem_ty))?;
                }
                Ok(())
            }
            Type::Map(key_ty, elem_ty) => {
                for elem in elems {
                    let Some(key) = &elem.key else {
                        return Err(GoError::resolve(
                            elem.value.pos(),
                            "missing key in map literal",
                        ));
                    };
                    self.expr_with(key, Some(key_ty))?;
                    self.expr_with(&elem.value, Some(elem_ty))?;
                }
                Ok(())
            }
            other => Err(GoError::resolve(
                pos,
                format!("invalid composite literal type {}", other),
            )),
        }
    }

    fn call(&mut self, func: &Expr, args: &[Expr], spread: bool, pos: Pos) -> Result<()> {
        let target = match func {
            Expr::Ident(name, _) => self.lookup(name),
            Expr::Type(ty, _) => {
                self.type_expr(ty)?;
                return self.conversion_args("type", args, pos);
            }
            Expr::Selector { expr, name, .. } => {
                if let Expr::Ident(pkg, _) = &**expr {
                    if self.lookup(pkg) == Some(Name::Package) {
                        self.expr(func)?;
                        if let Some(Member::Const(_)) = self.program.imports[pkg.as_str()].member(name) {
                            return Err(GoError::resolve(
                                pos,
                                format!("invalid operation: cannot call non-function {}.{}", pkg, name),
                            ));
                        }
                        return self.args(args);
                    }
                }
                if name == "Error" {
                    self.expr(expr)?;
                    if !args.is_empty() {
                        return Err(GoError::resolve(pos, "too many arguments in call to Error"));
                    }
                    return Ok(());
                }
                None
            }
            _ => None,
        };

        match target {
            Some(Name::Type(_)) => {
                let Expr::Ident(name, _) = func else {
                    return Ok(());
                };
                self.conversion_args(name, args, pos)
            }
            Some(Name::Builtin(name)) => self.builtin(name, args, spread, pos),
            Some(Name::Func(index)) => {
                self.args(args)?;
                let Some(def) = self.program.func(index) else {
                    return Ok(());
                };
                let want = def.ty.num_in();
                let multi = args.len() == 1 && self.result_count(&args[0]).is_some_and(|n| n != 1);
                let got = if multi {
                    self.result_count(&args[0]).unwrap_or(1)
                } else {
                    args.len()
                };
                if !spread && got != want {
                    let which = if got < want { "not enough" } else { "too many" };
                    return Err(GoError::resolve(
                        pos,
                        format!("{} arguments in call to {}", which, def.name),
                    ));
                }
                Ok(())
            }
            _ => {
                self.expr(func)?;
                self.args(args)
            }
        }
    }

    fn args(&mut self, args: &[Expr]) -> Result<()> {
        for arg in args {
            self.expr(arg)?;
        }
        Ok(())
    }

    fn conversion_args(&mut self, name: &str, args: &[Expr], pos: Pos) -> Result<()> {
        match args.len() {
            1 => self.expr(&args[0]),
            0 => Err(GoError::resolve(pos, format!("missing argument in conversion to {}", name))),
            _ => Err(GoError::resolve(pos, format!("too many arguments in conversion to {}", name))),
        }
    }

    /// A type argument to `make` or `new`.
    fn type_arg(&mut self, arg: &Expr) -> Result<Type> {
        match arg {
            Expr::Type(ty, _) => self.type_expr(ty),
            Expr::Ident(name, pos) => match self.lookup(name) {
                Some(Name::Type(ty)) => Ok(ty),
                Some(_) => Err(GoError::resolve(*pos, format!("{} is not a type", name))),
                None => Err(GoError::resolve(*pos, format!("undefined: {}", name))),
            },
            Expr::Unary {
                op: UnaryOp::Deref,
                expr,
                ..
            } => Ok(Type::pointer(self.type_arg(expr)?)),
            other => Err(GoError::resolve(
                other.pos(),
                format!("{} is not a type", describe(other)),
            )),
        }
    }

    fn builtin(&mut self, name: &str, args: &[Expr], spread: bool, pos: Pos) -> Result<()> {
        let arity_error = |what: &str| {
            GoError::resolve(pos, format!("{} arguments for {}(...)", what, name))
        };
        match name {
            "len" | "panic" => {
                if args.len() != 1 {
                    return Err(arity_error(if args.is_empty() { "not enough" } else { "too many" }));
                }
                self.expr(&args[0])
            }
            "append" => {
                if args.is_empty() {
                    return Err(arity_error("not enough"));
                }
                if spread && args.len() != 2 {
                    return Err(GoError::resolve(pos, "can only use ... with final argument in list"));
                }
                self.args(args)
            }
            "delete" => {
                if args.len() != 2 {
                    return Err(arity_error(if args.len() < 2 { "not enough" } else { "too many" }));
                }
                self.args(args)
            }
            "new" => {
                if args.len() != 1 {
                    return Err(arity_error(if args.is_empty() { "not enough" } else { "too many" }));
                }
                self.type_arg(&args[0]).map(|_| ())
            }
            "make" => {
                let Some(first) = args.first() else {
                    return Err(arity_error("not enough"));
                };
                let ty = self.type_arg(first)?;
                let max = match ty {
                    Type::Slice(_) => 3,
                    Type::Map(..) => 2,
                    other => {
                        return Err(GoError::resolve(
                            pos,
                            format!("invalid argument: cannot make {}; type must be slice or map", other),
                        ))
                    }
                };
                if max == 3 && args.len() < 2 {
                    return Err(GoError::resolve(
                        pos,
                        format!("invalid operation: {}(...) expects 2 or 3 arguments; found 1", name),
                    ));
                }
                if args.len() > max {
                    return Err(arity_error("too many"));
                }
                self.args(&args[1..])
            }
            _ => self.args(args),
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn post_pos(stmt: &Stmt) -> Pos {
    match stmt {
        Stmt::Define { pos, .. } => *pos,
        _ => Pos::default(),
    }
}

/// Short description of an expression for messages.
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name, _) => name.clone(),
        Expr::Int(v, _) => v.to_string(),
        Expr::Float(v, _) => v.to_string(),
        Expr::Str(s, _) => format!("{:?}", s),
        Expr::Call { func, .. } => format!("{}(...)", describe(func)),
        Expr::Selector { expr, name, .. } => format!("{}.{}", describe(expr), name),
        Expr::Index { expr, .. } => format!("{}[...]", describe(expr)),
        Expr::Binary { op, lhs, rhs, .. } => {
            format!("{} {} {}", describe(lhs), op.symbol(), describe(rhs))
        }
        Expr::Unary { expr, .. } => format!("unary expression on {}", describe(expr)),
        Expr::SliceExpr { expr, .. } => format!("{}[:]", describe(expr)),
        Expr::Composite { .. } => "composite literal".to_string(),
        Expr::Type(..) => "type".to_string(),
    }
}

/// Go's terminating statement rules.
pub(crate) fn block_terminates(block: &Block) -> bool {
    block.stmts.last().is_some_and(stmt_terminates)
}

fn stmt_terminates(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return { .. } => true,
        Stmt::Expr(Expr::Call { func, .. }) => {
            matches!(&**func, Expr::Ident(name, _) if name == "panic")
        }
        Stmt::Block(block) => block_terminates(block),
        Stmt::If { then, els, .. } => {
            block_terminates(then) && els.as_deref().is_some_and(stmt_terminates)
        }
        Stmt::For { cond, body, .. } => cond.is_none() && !breaks(&body.stmts),
        Stmt::Switch { cases, .. } => {
            cases.iter().any(|c| c.is_default)
                && cases.iter().all(|c| {
                    c.body.last().is_some_and(stmt_terminates) && !breaks(&c.body)
                })
        }
        _ => false,
    }
}

/// Whether `stmts` contain a `break` that targets the enclosing statement.
fn breaks(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::Break(_) => true,
        Stmt::Block(block) => breaks(&block.stmts),
        Stmt::If { then, els, .. } => {
            breaks(&then.stmts) || els.as_deref().is_some_and(|e| breaks(std::slice::from_ref(e)))
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::parser::parse_file;
    use crate::stdlib::{self, Package};

    fn check_src(src: &str) -> Result<()> {
        let packages: HashMap<String, Arc<Package>> = stdlib::packages()
            .into_iter()
            .map(|p| (p.path.to_string(), Arc::new(p)))
            .collect();
        let program = Program::load(parse_file(src)?, &packages)?;
        check(&program)
    }

    fn err(src: &str) -> String {
        check_src(src).unwrap_err().to_string()
    }

    #[test]
    fn accepts_a_typical_module() {
        check_src(
            r#"package lib
import (
    "fmt"
    "strings"
)
type Person struct {
    Name string `tf:"name"`
    Tags []string
}
func Greet(p Person) (string, error) {
    if p.Name == "" {
        return "", fmt.Errorf("empty name")
    }
    out := []string{}
    for _, t := range p.Tags {
        out = append(out, strings.ToUpper(t))
    }
    return fmt.Sprintf("%s %v", p.Name, out), nil
}
func Loop() int {
    for {
        return 1
    }
}
"#,
        )
        .unwrap();
    }

    #[test]
    fn undefined_names_fail() {
        assert!(err("package lib\nfunc F() int { return x }\n").contains("undefined: x"));
        assert!(err("package lib\nimport \"strings\"\nfunc F() string { return strings.Nope(\"a\") }\n")
            .contains("undefined: strings.Nope"));
        assert!(err("package lib\nimport \"strings\"\nfunc F() { _ = strings }\n")
            .contains("use of package strings without selector"));
    }

    #[test]
    fn missing_return_is_reported() {
        assert!(err("package lib\nfunc F(x int) int { if x > 0 { return 1 } }\n")
            .contains("missing return"));
        check_src("package lib\nfunc F(x int) int { if x > 0 { return 1 } else { return 2 } }\n").unwrap();
        check_src("package lib\nfunc F() int { panic(\"no\") }\n").unwrap();
        assert!(err("package lib\nfunc F() int { for { break } }\n").contains("missing return"));
    }

    #[test]
    fn call_and_assignment_counts() {
        assert!(err("package lib\nfunc G(a int) int { return a }\nfunc F() int { return G() }\n")
            .contains("not enough arguments in call to G"));
        assert!(err("package lib\nfunc G() (int, int) { return 1, 2 }\nfunc F() int { a := G(); return a }\n")
            .contains("assignment mismatch"));
        assert!(err("package lib\nfunc F() (int, error) { return 1 }\n")
            .contains("not enough return values"));
        check_src("package lib\nfunc G() (int, error) { return 1, nil }\nfunc F() (int, error) { return G() }\n").unwrap();
    }

    #[test]
    fn define_needs_a_new_variable() {
        assert!(err("package lib\nfunc F() int { a := 1; a := 2; return a }\n")
            .contains("no new variables on left side of :="));
    }

    #[test]
    fn composite_literal_shapes() {
        let prelude = "package lib\ntype P struct { X int; Y int }\n";
        assert!(err(&format!("{}func F() P {{ return P{{Z: 1}} }}\n", prelude))
            .contains("unknown field Z in struct literal"));
        assert!(err(&format!("{}func F() P {{ return P{{1}} }}\n", prelude))
            .contains("too few values"));
        assert!(err(&format!("{}func F() P {{ return P{{X: 1, 2}} }}\n", prelude))
            .contains("mixture of field:value and value elements"));
        check_src(&format!("{}func F() []*P {{ return []*P{{{{X: 1}}, {{2, 3}}}} }}\n", prelude)).unwrap();
    }

    #[test]
    fn break_and_continue_placement() {
        assert!(err("package lib\nfunc F() { break }\n").contains("break is not in a loop"));
        assert!(err("package lib\nfunc F(x int) { switch x { case 1: continue } }\n")
            .contains("continue is not in a loop"));
    }

    #[test]
    fn unused_expression_statement() {
        assert!(err("package lib\nfunc F(x int) { x + 1 }\n").contains("is not used"));
    }
}
