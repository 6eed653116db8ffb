//! Tree-walking evaluator
//!
//! A [`Machine`] executes one top-level call. It borrows the immutable
//! [`Program`] and owns every value created during the call, so machines
//! for the same program can run on different threads at once.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use crate::ast::{AssignOp, BinaryOp, Block, CaseClause, Element, Expr, Stmt, UnaryOp};
use crate::error::{GoError, Pos, Result};
use crate::interp::Options;
use crate::ops;
use crate::program::{FuncDef, Program};
use crate::resolve::{global_name, Name};
use crate::stack::ensure_sufficient_stack;
use crate::stdlib::Member;
use crate::types::{StructType, Type};
use crate::value::{
    Cell, FuncValue, MapKey, MapValue, PointerValue, SliceValue, Target, Value,
};

/// Largest slice `make` will allocate.
const MAX_MAKE_LEN: usize = 1 << 24;

pub(crate) struct Machine<'p> {
    program: &'p Program,
    options: Options,
    steps: u64,
    depth: usize,
}

struct Binding {
    cell: Cell,
    /// Declared type; `None` for variables initialised from an untyped nil.
    ty: Option<Type>,
}

struct Frame<'p> {
    func: &'p FuncDef,
    scopes: Vec<HashMap<String, Binding>>,
}

impl Frame<'_> {
    fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn declare(&mut self, name: &str, ty: Option<Type>, value: Value) {
        if name == "_" {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                Binding {
                    cell: Rc::new(RefCell::new(value)),
                    ty,
                },
            );
        }
    }

    /// Give every variable of the innermost scope a fresh cell, so each loop
    /// iteration has its own copy.
    fn renew_scope(&mut self) -> Result<()> {
        if let Some(scope) = self.scopes.last_mut() {
            for binding in scope.values_mut() {
                let value = load_cell(&binding.cell)?;
                binding.cell = Rc::new(RefCell::new(value));
            }
        }
        Ok(())
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Vec<Value>),
}

/// Left-hand side of an assignment.
enum Place {
    Blank,
    Slot(Target, Option<Type>),
    MapEntry(MapValue, MapKey),
}

/// What a selector's base expression refers to.
enum Base {
    Pointer(PointerValue),
    Struct(Arc<StructType>),
    Other(String),
}

fn load_cell(cell: &Cell) -> Result<Value> {
    cell.try_borrow()
        .map(|v| v.clone())
        .map_err(|_| GoError::runtime(Pos::default(), "concurrent access to a value"))
}

fn nil_dereference() -> GoError {
    GoError::panic("runtime error: invalid memory address or nil pointer dereference")
}

fn stmt_pos(stmt: &Stmt) -> Pos {
    match stmt {
        Stmt::Var { pos, .. }
        | Stmt::Define { pos, .. }
        | Stmt::Assign { pos, .. }
        | Stmt::IncDec { pos, .. }
        | Stmt::Return { pos, .. }
        | Stmt::If { pos, .. }
        | Stmt::For { pos, .. }
        | Stmt::Range { pos, .. }
        | Stmt::Switch { pos, .. } => *pos,
        Stmt::Break(pos) | Stmt::Continue(pos) => *pos,
        Stmt::Expr(expr) => expr.pos(),
        Stmt::Block(_) => Pos::default(),
    }
}

fn assign_op(op: AssignOp) -> Option<BinaryOp> {
    match op {
        AssignOp::Assign => None,
        AssignOp::Add => Some(BinaryOp::Add),
        AssignOp::Sub => Some(BinaryOp::Sub),
        AssignOp::Mul => Some(BinaryOp::Mul),
        AssignOp::Div => Some(BinaryOp::Div),
        AssignOp::Rem => Some(BinaryOp::Rem),
    }
}

fn index_value(value: Value, len: usize, pos: Pos) -> Result<usize> {
    let index = match value {
        Value::Int(i) => i,
        Value::Float(f) if f.fract() == 0.0 => f as i64,
        other => {
            return Err(GoError::runtime(
                pos,
                format!("invalid argument: index of type {} must be integer", other.type_name()),
            ))
        }
    };
    if index < 0 || index as u64 >= len as u64 {
        return Err(GoError::panic(format!(
            "runtime error: index out of range [{}] with length {}",
            index, len
        )));
    }
    Ok(index as usize)
}

fn bound_value(value: Value, pos: Pos) -> Result<usize> {
    match value {
        Value::Int(i) if i >= 0 => Ok(i as usize),
        Value::Int(i) => Err(GoError::panic(format!(
            "runtime error: slice bounds out of range [{}:]",
            i
        ))),
        other => Err(GoError::runtime(
            pos,
            format!("invalid argument: index of type {} must be integer", other.type_name()),
        )),
    }
}

fn expr_arg<'e>(args: &'e [Expr], index: usize, builtin: &str, pos: Pos) -> Result<&'e Expr> {
    args.get(index).ok_or_else(|| {
        GoError::runtime(pos, format!("not enough arguments for {}(...)", builtin))
    })
}

/// Iteration state of a `range` loop.
struct RangeIter {
    source: RangeSource,
    key_ty: Option<Type>,
    value_ty: Option<Type>,
}

enum RangeSource {
    Slice(SliceValue, usize),
    Entries(std::vec::IntoIter<(Value, Value)>),
    Count(i64, i64),
}

impl RangeIter {
    fn new(subject: Value, pos: Pos) -> Result<Self> {
        let (source, key_ty, value_ty) = match subject {
            Value::Slice(s) => {
                let elem = s.elem.clone();
                (RangeSource::Slice(s, 0), Some(Type::Int), Some(elem))
            }
            Value::Map(m) => {
                let entries: Vec<_> = m
                    .entries()
                    .into_iter()
                    .map(|(k, v)| (k.to_value(), v))
                    .collect();
                (
                    RangeSource::Entries(entries.into_iter()),
                    Some(m.key.clone()),
                    Some(m.elem.clone()),
                )
            }
            Value::Str(s) => {
                let entries: Vec<_> = s
                    .char_indices()
                    .map(|(i, c)| (Value::Int(i as i64), Value::Int(c as i64)))
                    .collect();
                (
                    RangeSource::Entries(entries.into_iter()),
                    Some(Type::Int),
                    Some(Type::Int),
                )
            }
            Value::Int(n) => (RangeSource::Count(0, n), Some(Type::Int), None),
            Value::Nil => (RangeSource::Entries(Vec::new().into_iter()), None, None),
            other => {
                return Err(GoError::runtime(
                    pos,
                    format!("cannot range over value of type {}", other.type_name()),
                ))
            }
        };
        Ok(Self {
            source,
            key_ty,
            value_ty,
        })
    }

    fn next(&mut self) -> Result<Option<(Value, Value)>> {
        match &mut self.source {
            RangeSource::Slice(slice, at) => {
                if *at >= slice.len {
                    return Ok(None);
                }
                let item = slice.get(*at)?;
                let key = Value::Int(*at as i64);
                *at += 1;
                Ok(Some((key, item)))
            }
            RangeSource::Entries(entries) => Ok(entries.next()),
            RangeSource::Count(at, n) => {
                if *at >= *n {
                    return Ok(None);
                }
                let key = Value::Int(*at);
                *at += 1;
                Ok(Some((key, Value::Nil)))
            }
        }
    }
}

impl<'p> Machine<'p> {
    pub(crate) fn new(program: &'p Program, options: Options) -> Self {
        Self {
            program,
            options,
            steps: 0,
            depth: 0,
        }
    }

    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.options.max_steps {
            return Err(GoError::Limit(format!(
                "execution exceeded the limit of {} steps",
                self.options.max_steps
            )));
        }
        Ok(())
    }

    /// Call the function at `index` with already evaluated arguments.
    pub(crate) fn call(&mut self, index: usize, args: Vec<Value>) -> Result<Vec<Value>> {
        let program = self.program;
        let def = program.func(index).ok_or_else(|| {
            GoError::runtime(Pos::default(), format!("no function with index {}", index))
        })?;
        if args.len() != def.ty.num_in() {
            return Err(GoError::runtime(
                def.pos,
                format!(
                    "wrong number of arguments in call to {}: have {}, want {}",
                    def.name,
                    args.len(),
                    def.ty.num_in()
                ),
            ));
        }
        if self.depth >= self.options.max_call_depth {
            return Err(GoError::Limit(format!(
                "call depth exceeded the limit of {} in {}",
                self.options.max_call_depth, def.name
            )));
        }
        self.tick()?;

        let mut top = HashMap::new();
        for ((name, ty), arg) in def.params.iter().zip(&def.ty.params).zip(args) {
            let value = arg.assign_to(ty).map_err(|e| e.with_pos(def.pos))?;
            if let Some(name) = name.as_deref().filter(|n| *n != "_") {
                top.insert(
                    name.to_string(),
                    Binding {
                        cell: Rc::new(RefCell::new(value)),
                        ty: Some(ty.clone()),
                    },
                );
            }
        }
        for (name, ty) in def.results.iter().zip(&def.ty.results) {
            if let Some(name) = name.as_deref().filter(|n| *n != "_") {
                top.insert(
                    name.to_string(),
                    Binding {
                        cell: Rc::new(RefCell::new(Value::zero(ty))),
                        ty: Some(ty.clone()),
                    },
                );
            }
        }
        let mut frame = Frame {
            func: def,
            scopes: vec![top],
        };

        self.depth += 1;
        let flow = ensure_sufficient_stack(|| self.block(&mut frame, &def.body));
        self.depth -= 1;

        let values = match flow? {
            Flow::Return(values) if values.is_empty() && def.ty.num_out() > 0 => {
                let mut named = Vec::with_capacity(def.ty.num_out());
                for (name, ty) in def.results.iter().zip(&def.ty.results) {
                    let binding = name.as_deref().and_then(|n| frame.scopes[0].get(n));
                    named.push(match binding {
                        Some(b) => load_cell(&b.cell)?,
                        None => Value::zero(ty),
                    });
                }
                named
            }
            Flow::Return(values) => values,
            _ if def.ty.num_out() == 0 => Vec::new(),
            _ => {
                return Err(GoError::runtime(
                    def.pos,
                    format!("missing return in {}", def.name),
                ))
            }
        };
        if values.len() != def.ty.num_out() {
            return Err(GoError::runtime(
                def.pos,
                format!(
                    "wrong number of return values from {}: have {}, want {}",
                    def.name,
                    values.len(),
                    def.ty.num_out()
                ),
            ));
        }
        values
            .into_iter()
            .zip(&def.ty.results)
            .map(|(v, ty)| v.assign_to(ty).map_err(|e| e.with_pos(def.pos)))
            .collect()
    }

    fn scoped<'f>(
        &mut self,
        frame: &mut Frame<'f>,
        f: impl FnOnce(&mut Self, &mut Frame<'f>) -> Result<Flow>,
    ) -> Result<Flow> {
        frame.push();
        let out = f(self, frame);
        frame.pop();
        out
    }

    fn block(&mut self, frame: &mut Frame<'_>, block: &Block) -> Result<Flow> {
        self.scoped(frame, |m, frame| m.stmts(frame, &block.stmts))
    }

    fn stmts(&mut self, frame: &mut Frame<'_>, stmts: &[Stmt]) -> Result<Flow> {
        for stmt in stmts {
            match self.stmt(frame, stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn stmt(&mut self, frame: &mut Frame<'_>, stmt: &Stmt) -> Result<Flow> {
        self.tick()?;
        ensure_sufficient_stack(|| self.exec(frame, stmt)).map_err(|e| e.with_pos(stmt_pos(stmt)))
    }

    fn exec(&mut self, frame: &mut Frame<'_>, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Var {
                names,
                ty,
                values,
                pos,
            } => {
                let ty = ty
                    .as_ref()
                    .map(|t| self.program.resolve_type(t))
                    .transpose()?;
                let values = match (&ty, values.is_empty()) {
                    (Some(ty), true) => names.iter().map(|_| Value::zero(ty)).collect(),
                    (None, true) => {
                        return Err(GoError::runtime(*pos, "missing type or init expr"))
                    }
                    (_, false) => self.values(frame, values, names.len(), ty.as_ref(), *pos)?,
                };
                for (name, value) in names.iter().zip(values) {
                    let (value, ty) = typed(value, ty.as_ref())?;
                    frame.declare(name, ty, value);
                }
                Ok(Flow::Normal)
            }
            Stmt::Define { names, values, pos } => {
                let values = self.values(frame, values, names.len(), None, *pos)?;
                for (name, value) in names.iter().zip(values) {
                    if name == "_" {
                        continue;
                    }
                    let existing = frame.scopes.last().and_then(|s| s.get(name.as_str()));
                    match existing {
                        Some(binding) => {
                            let target = Target::cell(binding.cell.clone());
                            let ty = binding.ty.clone();
                            self.store(Place::Slot(target, ty), value)?;
                        }
                        None => {
                            let (value, ty) = typed(value, None)?;
                            frame.declare(name, ty, value);
                        }
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Assign {
                targets,
                op,
                values,
                pos,
            } => {
                match assign_op(*op) {
                    None => {
                        let places = targets
                            .iter()
                            .map(|t| self.place(frame, t))
                            .collect::<Result<Vec<_>>>()?;
                        let values = self.values(frame, values, targets.len(), None, *pos)?;
                        for (place, value) in places.into_iter().zip(values) {
                            self.store(place, value)?;
                        }
                    }
                    Some(bin) => {
                        let (Some(target), Some(value)) = (targets.first(), values.first()) else {
                            return Err(GoError::runtime(*pos, "invalid compound assignment"));
                        };
                        let place = self.place(frame, target)?;
                        let rhs = self.eval(frame, value)?;
                        let current = self.load_place(&place, *pos)?;
                        let updated = ops::binary(bin, current, rhs)?;
                        self.store(place, updated)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::IncDec { target, inc, pos } => {
                let place = self.place(frame, target)?;
                let current = self.load_place(&place, *pos)?;
                let op = if *inc { BinaryOp::Add } else { BinaryOp::Sub };
                let updated = ops::binary(op, current, Value::Int(1))?;
                self.store(place, updated)?;
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval_multi(frame, expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Return { values, .. } => {
                let func = frame.func;
                let results = &func.ty.results;
                let values = if values.len() == 1 && results.len() > 1 {
                    self.eval_multi(frame, &values[0])?
                } else {
                    let mut out = Vec::with_capacity(values.len());
                    for (i, value) in values.iter().enumerate() {
                        out.push(self.eval_with(frame, value, results.get(i))?);
                    }
                    out
                };
                Ok(Flow::Return(values))
            }
            Stmt::If {
                init,
                cond,
                then,
                els,
                ..
            } => self.scoped(frame, |m, frame| {
                if let Some(init) = init {
                    m.stmt(frame, init)?;
                }
                if m.condition(frame, cond, "if")? {
                    m.block(frame, then)
                } else if let Some(els) = els {
                    m.stmt(frame, els)
                } else {
                    Ok(Flow::Normal)
                }
            }),
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => self.scoped(frame, |m, frame| {
                if let Some(init) = init {
                    m.stmt(frame, init)?;
                }
                loop {
                    if let Some(cond) = cond {
                        if !m.condition(frame, cond, "for")? {
                            break;
                        }
                    }
                    m.tick()?;
                    match m.block(frame, body)? {
                        Flow::Break => break,
                        Flow::Return(values) => return Ok(Flow::Return(values)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    frame.renew_scope()?;
                    if let Some(post) = post {
                        m.stmt(frame, post)?;
                    }
                }
                Ok(Flow::Normal)
            }),
            Stmt::Range {
                key,
                value,
                define,
                expr,
                body,
                pos,
            } => {
                let subject = self.eval(frame, expr)?;
                if matches!(subject, Value::Int(_)) && value.is_some() {
                    return Err(GoError::runtime(
                        *pos,
                        "range over int permits only one iteration variable",
                    ));
                }
                let mut iter = RangeIter::new(subject, *pos)?;
                self.scoped(frame, |m, frame| {
                    while let Some((k, v)) = iter.next()? {
                        m.tick()?;
                        let pairs = [(key, k, &iter.key_ty), (value, v, &iter.value_ty)];
                        for (target, item, ty) in pairs {
                            let Some(target) = target else { continue };
                            if *define {
                                if let Expr::Ident(name, _) = target {
                                    frame.declare(name, ty.clone(), item);
                                }
                            } else {
                                let place = m.place(frame, target)?;
                                m.store(place, item)?;
                            }
                        }
                        match m.block(frame, body)? {
                            Flow::Break => break,
                            Flow::Return(values) => return Ok(Flow::Return(values)),
                            Flow::Normal | Flow::Continue => {}
                        }
                    }
                    Ok(Flow::Normal)
                })
            }
            Stmt::Switch {
                init, tag, cases, ..
            } => self.scoped(frame, |m, frame| {
                if let Some(init) = init {
                    m.stmt(frame, init)?;
                }
                let tag = match tag {
                    Some(tag) => m.eval(frame, tag)?,
                    None => Value::Bool(true),
                };
                let Some(case) = m.select_case(frame, &tag, cases)? else {
                    return Ok(Flow::Normal);
                };
                match m.scoped(frame, |m, frame| m.stmts(frame, &case.body))? {
                    Flow::Break => Ok(Flow::Normal),
                    other => Ok(other),
                }
            }),
            Stmt::Block(block) => self.block(frame, block),
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::Continue(_) => Ok(Flow::Continue),
        }
    }

    fn select_case<'c>(
        &mut self,
        frame: &mut Frame<'_>,
        tag: &Value,
        cases: &'c [CaseClause],
    ) -> Result<Option<&'c CaseClause>> {
        for case in cases {
            for expr in &case.exprs {
                let candidate = self.eval(frame, expr)?;
                if tag.equals(&candidate).map_err(|e| e.with_pos(case.pos))? {
                    return Ok(Some(case));
                }
            }
        }
        Ok(cases.iter().find(|c| c.is_default))
    }

    fn condition(&mut self, frame: &mut Frame<'_>, expr: &Expr, what: &str) -> Result<bool> {
        match self.eval(frame, expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(GoError::runtime(
                expr.pos(),
                format!(
                    "non-boolean condition in {} statement (type {})",
                    what,
                    other.type_name()
                ),
            )),
        }
    }

    /// Right-hand side values for `want` targets: one value per target, a
    /// single multi-value call, or a comma-ok map index.
    fn values(
        &mut self,
        frame: &mut Frame<'_>,
        exprs: &[Expr],
        want: usize,
        expected: Option<&Type>,
        pos: Pos,
    ) -> Result<Vec<Value>> {
        if exprs.len() == want {
            let mut out = Vec::with_capacity(want);
            for expr in exprs {
                out.push(self.eval_with(frame, expr, expected)?);
            }
            return Ok(out);
        }
        if let [expr] = exprs {
            if let (2, Expr::Index { expr: base, index, pos }) = (want, expr) {
                return self.comma_ok(frame, base, index, *pos);
            }
            let values = self.eval_multi(frame, expr)?;
            if values.len() == want {
                return Ok(values);
            }
            return Err(GoError::runtime(
                pos,
                format!(
                    "assignment mismatch: {} variables but {} values",
                    want,
                    values.len()
                ),
            ));
        }
        Err(GoError::runtime(
            pos,
            format!(
                "assignment mismatch: {} variables but {} values",
                want,
                exprs.len()
            ),
        ))
    }

    fn comma_ok(
        &mut self,
        frame: &mut Frame<'_>,
        base: &Expr,
        index: &Expr,
        pos: Pos,
    ) -> Result<Vec<Value>> {
        let map = match self.eval(frame, base)? {
            Value::Map(m) => m,
            other => {
                return Err(GoError::runtime(
                    pos,
                    format!(
                        "assignment mismatch: 2 variables but index of {} yields 1 value",
                        other.type_name()
                    ),
                ))
            }
        };
        let key = self.map_key(frame, &map, index)?;
        Ok(match map.get(&key) {
            Some(v) => vec![v, Value::Bool(true)],
            None => vec![Value::zero(&map.elem), Value::Bool(false)],
        })
    }

    fn map_key(&mut self, frame: &mut Frame<'_>, map: &MapValue, index: &Expr) -> Result<MapKey> {
        let key = self.eval(frame, index)?.assign_to(&map.key)?;
        MapKey::from_value(&key)
    }

    fn place(&mut self, frame: &mut Frame<'_>, expr: &Expr) -> Result<Place> {
        match expr {
            Expr::Ident(name, _) if name == "_" => Ok(Place::Blank),
            Expr::Index { expr: base, index, pos } => match self.eval(frame, base)? {
                Value::Map(map) => {
                    let key = self.map_key(frame, &map, index)?;
                    Ok(Place::MapEntry(map, key))
                }
                Value::Slice(slice) => {
                    let i = self.eval(frame, index)?;
                    let i = index_value(i, slice.len, *pos)?;
                    Ok(Place::Slot(slice.target(i)?, Some(slice.elem.clone())))
                }
                other => Err(GoError::runtime(
                    *pos,
                    format!(
                        "cannot assign to index of {} (neither addressable nor a map index expression)",
                        other.type_name()
                    ),
                )),
            },
            _ => match self.target_of(frame, expr)? {
                Some((target, ty)) => Ok(Place::Slot(target, ty)),
                None => Err(GoError::runtime(expr.pos(), "cannot assign to expression")),
            },
        }
    }

    fn load_place(&self, place: &Place, pos: Pos) -> Result<Value> {
        match place {
            Place::Blank => Err(GoError::runtime(pos, "cannot use _ as value")),
            Place::Slot(target, _) => target.load(),
            Place::MapEntry(map, key) => Ok(map.get(key).unwrap_or_else(|| Value::zero(&map.elem))),
        }
    }

    fn store(&self, place: Place, value: Value) -> Result<()> {
        match place {
            Place::Blank => Ok(()),
            Place::Slot(target, ty) => {
                let value = match ty {
                    Some(ty) => value.assign_to(&ty)?,
                    None => value,
                };
                target.store(value)
            }
            Place::MapEntry(map, key) => {
                let value = value.assign_to(&map.elem)?;
                map.insert(key, value)
            }
        }
    }

    /// Addressable location of `expr`, with its declared type when known.
    fn target_of(
        &mut self,
        frame: &mut Frame<'_>,
        expr: &Expr,
    ) -> Result<Option<(Target, Option<Type>)>> {
        match expr {
            Expr::Ident(name, _) => Ok(frame
                .lookup(name)
                .map(|b| (Target::cell(b.cell.clone()), b.ty.clone()))),
            Expr::Selector { expr: base, name, pos } => {
                if self.is_package(frame, base) {
                    return Ok(None);
                }
                let (target, info) = match self.target_of(frame, base)? {
                    Some((target, _)) => {
                        let info = target.with(describe_base)?;
                        (Some(target), info)
                    }
                    None => {
                        let value = self.eval(frame, base)?;
                        (None, describe_base(&value))
                    }
                };
                match info {
                    Base::Pointer(pointer) => {
                        let target = pointer.target.ok_or_else(nil_dereference)?;
                        let st = pointer.elem.as_struct().ok_or_else(|| {
                            no_field(&pointer.elem.to_string(), name, *pos)
                        })?;
                        let (index, ty) = field_of(st, name, *pos)?;
                        Ok(Some((target.field(index), Some(ty))))
                    }
                    Base::Struct(st) => {
                        let (index, ty) = field_of(&st, name, *pos)?;
                        Ok(target.map(|t| (t.field(index), Some(ty))))
                    }
                    Base::Other(type_name) => Err(no_field(&type_name, name, *pos)),
                }
            }
            Expr::Index { expr: base, index, pos } => match self.eval(frame, base)? {
                Value::Slice(slice) => {
                    let i = self.eval(frame, index)?;
                    let i = index_value(i, slice.len, *pos)?;
                    Ok(Some((slice.target(i)?, Some(slice.elem.clone()))))
                }
                _ => Ok(None),
            },
            Expr::Unary {
                op: UnaryOp::Deref,
                expr: inner,
                pos,
            } => match self.eval(frame, inner)? {
                Value::Pointer(pointer) => {
                    let target = pointer.target.ok_or_else(nil_dereference)?;
                    Ok(Some((target, Some(pointer.elem))))
                }
                Value::Nil => Err(nil_dereference()),
                other => Err(GoError::runtime(
                    *pos,
                    format!("invalid operation: cannot indirect value of type {}", other.type_name()),
                )),
            },
            _ => Ok(None),
        }
    }

    fn is_package(&self, frame: &Frame<'_>, expr: &Expr) -> bool {
        matches!(expr, Expr::Ident(name, _)
            if frame.lookup(name).is_none() && self.program.imports.contains_key(name.as_str()))
    }

    fn eval(&mut self, frame: &mut Frame<'_>, expr: &Expr) -> Result<Value> {
        self.eval_with(frame, expr, None)
    }

    /// Evaluate `expr` to one value. `expected` types elided composite
    /// literals.
    fn eval_with(
        &mut self,
        frame: &mut Frame<'_>,
        expr: &Expr,
        expected: Option<&Type>,
    ) -> Result<Value> {
        ensure_sufficient_stack(|| self.eval_expr(frame, expr, expected))
    }

    fn eval_expr(
        &mut self,
        frame: &mut Frame<'_>,
        expr: &Expr,
        expected: Option<&Type>,
    ) -> Result<Value> {
        match expr {
            Expr::Int(v, _) => Ok(Value::Int(*v)),
            Expr::Float(v, _) => Ok(Value::Float(*v)),
            Expr::Str(s, _) => Ok(Value::Str(s.clone())),
            Expr::Ident(name, pos) => self.ident(frame, name, *pos),
            Expr::Unary { op, expr: inner, pos } => match op {
                UnaryOp::Addr => {
                    let elem = match expected {
                        Some(Type::Pointer(elem)) => Some(&**elem),
                        _ => None,
                    };
                    self.address_of(frame, inner, elem, *pos)
                }
                UnaryOp::Deref => match self.eval(frame, inner)? {
                    Value::Pointer(pointer) => pointer.load()?.ok_or_else(nil_dereference),
                    Value::Nil => Err(nil_dereference()),
                    other => Err(GoError::runtime(
                        *pos,
                        format!("invalid operation: cannot indirect value of type {}", other.type_name()),
                    )),
                },
                op => {
                    let value = self.eval(frame, inner)?;
                    ops::unary(*op, value).map_err(|e| e.with_pos(*pos))
                }
            },
            Expr::Binary { op, lhs, rhs, pos } => {
                let left = self.eval(frame, lhs)?;
                match (op, left.as_bool()) {
                    (BinaryOp::And, Some(false)) => return Ok(Value::Bool(false)),
                    (BinaryOp::Or, Some(true)) => return Ok(Value::Bool(true)),
                    _ => {}
                }
                let right = self.eval(frame, rhs)?;
                ops::binary(*op, left, right).map_err(|e| e.with_pos(*pos))
            }
            Expr::Call {
                func,
                args,
                spread,
                pos,
            } => {
                let mut values = self.call_expr(frame, func, args, *spread, *pos)?;
                match values.len() {
                    1 => Ok(values.remove(0)),
                    0 => Err(GoError::runtime(*pos, "function call (no value) used as value")),
                    n => Err(GoError::runtime(
                        *pos,
                        format!("multiple-value function call ({} values) in single-value context", n),
                    )),
                }
            }
            Expr::Selector { expr: base, name, pos } => self.selector(frame, base, name, *pos),
            Expr::Index { expr: base, index, pos } => self.index(frame, base, index, *pos),
            Expr::SliceExpr { expr: base, lo, hi, pos } => {
                let subject = self.eval(frame, base)?;
                let lo = match lo {
                    Some(lo) => bound_value(self.eval(frame, lo)?, *pos)?,
                    None => 0,
                };
                let hi = match hi {
                    Some(hi) => Some(bound_value(self.eval(frame, hi)?, *pos)?),
                    None => None,
                };
                match subject {
                    Value::Slice(slice) => Ok(Value::Slice(slice.reslice(lo, hi)?)),
                    Value::Str(s) => {
                        let hi = hi.unwrap_or(s.len());
                        if lo > hi || hi > s.len() {
                            return Err(GoError::panic(format!(
                                "runtime error: slice bounds out of range [{}:{}] with length {}",
                                lo,
                                hi,
                                s.len()
                            )));
                        }
                        Ok(Value::Str(
                            String::from_utf8_lossy(&s.as_bytes()[lo..hi]).into_owned(),
                        ))
                    }
                    other => Err(GoError::runtime(
                        *pos,
                        format!("cannot slice value of type {}", other.type_name()),
                    )),
                }
            }
            Expr::Composite { ty, elems, pos } => {
                let ty = match (ty, expected) {
                    (Some(ty), _) => self.program.resolve_type(ty)?,
                    (None, Some(Type::Pointer(elem))) => {
                        let value = self.composite(frame, elem, elems, *pos)?;
                        return Ok(Value::pointer_to((**elem).clone(), value));
                    }
                    (None, Some(ty)) => ty.clone(),
                    (None, None) => {
                        return Err(GoError::runtime(
                            *pos,
                            "invalid composite literal type: missing type",
                        ))
                    }
                };
                self.composite(frame, &ty, elems, *pos)
            }
            Expr::Type(_, pos) => Err(GoError::runtime(*pos, "type is not an expression")),
        }
    }

    /// All results of `expr`; only calls can yield other than one value.
    fn eval_multi(&mut self, frame: &mut Frame<'_>, expr: &Expr) -> Result<Vec<Value>> {
        match expr {
            Expr::Call {
                func,
                args,
                spread,
                pos,
            } => self.call_expr(frame, func, args, *spread, *pos),
            other => Ok(vec![self.eval(frame, other)?]),
        }
    }

    fn ident(&self, frame: &Frame<'_>, name: &str, pos: Pos) -> Result<Value> {
        if let Some(binding) = frame.lookup(name) {
            return load_cell(&binding.cell);
        }
        match global_name(self.program, name) {
            Some(Name::Const) => self
                .program
                .consts
                .get(name)
                .map(|c| c.to_value())
                .ok_or_else(|| GoError::runtime(pos, format!("undefined: {}", name))),
            Some(Name::Func(index)) => Ok(Value::Func(FuncValue::User(index))),
            Some(Name::Literal) => Ok(match name {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Nil,
            }),
            Some(_) => Err(GoError::runtime(pos, format!("{} is not an expression", name))),
            None => Err(GoError::runtime(pos, format!("undefined: {}", name))),
        }
    }

    fn selector(&mut self, frame: &mut Frame<'_>, base: &Expr, name: &str, pos: Pos) -> Result<Value> {
        if let Expr::Ident(pkg, _) = base {
            if self.is_package(frame, base) {
                let package = &self.program.imports[pkg.as_str()];
                return match package.member(name) {
                    Some(Member::Func(f)) => Ok(Value::Func(FuncValue::Native(*f))),
                    Some(Member::Const(c)) => Ok(c.to_value()),
                    None => Err(GoError::runtime(pos, format!("undefined: {}.{}", pkg, name))),
                };
            }
        }
        match self.eval(frame, base)? {
            Value::Pointer(pointer) => {
                let st = pointer
                    .elem
                    .as_struct()
                    .ok_or_else(|| no_field(&pointer.elem.to_string(), name, pos))?;
                let (index, _) = field_of(st, name, pos)?;
                let target = pointer.target.as_ref().ok_or_else(nil_dereference)?;
                target.field(index).load()
            }
            Value::Struct(s) => {
                let (index, _) = field_of(&s.ty, name, pos)?;
                let mut fields = s.fields;
                Ok(fields.swap_remove(index))
            }
            Value::Nil => Err(nil_dereference()),
            other => Err(no_field(&other.type_name(), name, pos)),
        }
    }

    fn index(&mut self, frame: &mut Frame<'_>, base: &Expr, index: &Expr, pos: Pos) -> Result<Value> {
        match self.eval(frame, base)? {
            Value::Slice(slice) => {
                let i = self.eval(frame, index)?;
                slice.get(index_value(i, slice.len, pos)?)
            }
            Value::Str(s) => {
                let i = self.eval(frame, index)?;
                let i = index_value(i, s.len(), pos)?;
                Ok(Value::Int(i64::from(s.as_bytes()[i])))
            }
            Value::Map(map) => {
                let key = self.map_key(frame, &map, index)?;
                Ok(map.get(&key).unwrap_or_else(|| Value::zero(&map.elem)))
            }
            other => Err(GoError::runtime(
                pos,
                format!("invalid operation: cannot index value of type {}", other.type_name()),
            )),
        }
    }

    fn address_of(
        &mut self,
        frame: &mut Frame<'_>,
        inner: &Expr,
        expected: Option<&Type>,
        pos: Pos,
    ) -> Result<Value> {
        if let Expr::Composite { .. } = inner {
            let value = self.eval_with(frame, inner, expected)?;
            let ty = value.static_type().ok_or_else(|| {
                GoError::runtime(pos, "invalid operation: cannot take address of literal")
            })?;
            return Ok(Value::pointer_to(ty, value));
        }
        let Some((target, ty)) = self.target_of(frame, inner)? else {
            return Err(GoError::runtime(
                pos,
                "invalid operation: cannot take address of expression",
            ));
        };
        let elem = match ty {
            Some(ty) => ty,
            None => target.load()?.static_type().ok_or_else(|| {
                GoError::runtime(pos, "invalid operation: cannot take address of untyped nil")
            })?,
        };
        Ok(Value::Pointer(PointerValue {
            elem,
            target: Some(target),
        }))
    }

    fn composite(
        &mut self,
        frame: &mut Frame<'_>,
        ty: &Type,
        elems: &[Element],
        pos: Pos,
    ) -> Result<Value> {
        match ty {
            Type::Struct(st) => {
                let mut fields: Vec<Value> = st.fields.iter().map(|f| Value::zero(&f.ty)).collect();
                for (i, elem) in elems.iter().enumerate() {
                    let index = match &elem.key {
                        Some(Expr::Ident(name, key_pos)) => field_of(st, name, *key_pos)?.0,
                        Some(other) => {
                            return Err(GoError::runtime(
                                other.pos(),
                                "invalid field name in struct literal",
                            ))
                        }
                        None => i,
                    };
                    let Some(field) = st.fields.get(index) else {
                        return Err(GoError::runtime(
                            pos,
                            format!("too many values in struct literal of type {}", ty),
                        ));
                    };
                    let value = self
                        .eval_with(frame, &elem.value, Some(&field.ty))?
                        .assign_to(&field.ty)
                        .map_err(|e| e.with_pos(elem.value.pos()))?;
                    fields[index] = value;
                }
                Ok(Value::struct_of(st.clone(), fields))
            }
            Type::Slice(elem_ty) => {
                let mut items: Vec<Value> = Vec::with_capacity(elems.len());
                let mut at = 0usize;
                for elem in elems {
                    if let Some(key) = &elem.key {
                        at = bound_value(self.eval(frame, key)?, key.pos())?;
                    }
                    let value = self
                        .eval_with(frame, &elem.value, Some(elem_ty))?
                        .assign_to(elem_ty)
                        .map_err(|e| e.with_pos(elem.value.pos()))?;
                    if at >= items.len() {
                        items.resize(at + 1, Value::zero(elem_ty));
                    }
                    items[at] = value;
                    at += 1;
                }
                Ok(Value::slice_of((**elem_ty).clone(), items))
            }
            Type::Map(key_ty, elem_ty) => {
                let mut entries = BTreeMap::new();
                for elem in elems {
                    let Some(key) = &elem.key else {
                        return Err(GoError::runtime(
                            elem.value.pos(),
                            "missing key in map literal",
                        ));
                    };
                    let key = self
                        .eval_with(frame, key, Some(key_ty))?
                        .assign_to(key_ty)
                        .map_err(|e| e.with_pos(key.pos()))?;
                    let value = self
                        .eval_with(frame, &elem.value, Some(elem_ty))?
                        .assign_to(elem_ty)
                        .map_err(|e| e.with_pos(elem.value.pos()))?;
                    entries.insert(MapKey::from_value(&key)?, value);
                }
                Ok(Value::map_of((**key_ty).clone(), (**elem_ty).clone(), entries))
            }
            other => Err(GoError::runtime(
                pos,
                format!("invalid composite literal type {}", other),
            )),
        }
    }

    fn call_expr(
        &mut self,
        frame: &mut Frame<'_>,
        func: &Expr,
        args: &[Expr],
        spread: bool,
        pos: Pos,
    ) -> Result<Vec<Value>> {
        match func {
            Expr::Ident(name, _) if frame.lookup(name).is_none() => {
                match global_name(self.program, name) {
                    Some(Name::Builtin(builtin)) => {
                        return self.builtin(frame, builtin, args, spread, pos)
                    }
                    Some(Name::Type(ty)) => return self.conversion(frame, &ty, args, pos),
                    _ => {}
                }
            }
            Expr::Type(ty, _) => {
                let ty = self.program.resolve_type(ty)?;
                return self.conversion(frame, &ty, args, pos);
            }
            Expr::Selector { expr: base, name, .. }
                if name == "Error" && !self.is_package(frame, base) =>
            {
                return match self.eval(frame, base)? {
                    Value::Error(e) => Ok(vec![Value::Str(e.message().to_string())]),
                    Value::Nil => Err(nil_dereference()),
                    other => Err(no_field(&other.type_name(), name, pos)),
                };
            }
            _ => {}
        }

        let callee = self.eval(frame, func)?;
        let args = self.args(frame, args, spread, pos)?;
        match callee {
            Value::Func(FuncValue::User(index)) => {
                if spread {
                    return Err(GoError::runtime(
                        pos,
                        "cannot use ... in call to non-variadic function",
                    ));
                }
                self.call(index, args).map_err(|e| e.with_pos(pos))
            }
            Value::Func(FuncValue::Native(native)) => {
                self.tick()?;
                native.call(&args).map_err(|e| e.with_pos(pos))
            }
            Value::Nil => Err(nil_dereference()),
            other => Err(GoError::runtime(
                pos,
                format!(
                    "invalid operation: cannot call non-function (value of type {})",
                    other.type_name()
                ),
            )),
        }
    }

    fn args(
        &mut self,
        frame: &mut Frame<'_>,
        args: &[Expr],
        spread: bool,
        pos: Pos,
    ) -> Result<Vec<Value>> {
        if let ([only @ Expr::Call { .. }], false) = (args, spread) {
            return self.eval_multi(frame, only);
        }
        let mut out = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let value = self.eval(frame, arg)?;
            if spread && i + 1 == args.len() {
                match value {
                    Value::Slice(slice) => out.extend(slice.items()?),
                    Value::Nil => {}
                    other => {
                        return Err(GoError::runtime(
                            pos,
                            format!("cannot use ... with value of type {}", other.type_name()),
                        ))
                    }
                }
            } else {
                out.push(value);
            }
        }
        Ok(out)
    }

    fn conversion(
        &mut self,
        frame: &mut Frame<'_>,
        ty: &Type,
        args: &[Expr],
        pos: Pos,
    ) -> Result<Vec<Value>> {
        let [arg] = args else {
            return Err(GoError::runtime(
                pos,
                format!("wrong argument count in conversion to {}", ty),
            ));
        };
        let value = self.eval_with(frame, arg, Some(ty))?;
        Ok(vec![ops::convert(ty, value).map_err(|e| e.with_pos(pos))?])
    }

    /// Type operand of `make` and `new`.
    fn type_arg(&self, frame: &Frame<'_>, expr: &Expr) -> Result<Type> {
        match expr {
            Expr::Type(ty, _) => self.program.resolve_type(ty),
            Expr::Ident(name, pos) if frame.lookup(name).is_none() => {
                match global_name(self.program, name) {
                    Some(Name::Type(ty)) => Ok(ty),
                    _ => Err(GoError::runtime(*pos, format!("{} is not a type", name))),
                }
            }
            Expr::Unary {
                op: UnaryOp::Deref,
                expr: inner,
                ..
            } => Ok(Type::pointer(self.type_arg(frame, inner)?)),
            other => Err(GoError::runtime(other.pos(), "expression is not a type")),
        }
    }

    fn size_arg(&mut self, frame: &mut Frame<'_>, expr: Option<&Expr>, what: &str) -> Result<Option<usize>> {
        let Some(expr) = expr else { return Ok(None) };
        match self.eval(frame, expr)?.assign_to(&Type::Int)? {
            Value::Int(n) if n >= 0 && (n as u64) <= MAX_MAKE_LEN as u64 => Ok(Some(n as usize)),
            _ => Err(GoError::panic(format!(
                "runtime error: makeslice: {} out of range",
                what
            ))),
        }
    }

    fn builtin(
        &mut self,
        frame: &mut Frame<'_>,
        name: &str,
        args: &[Expr],
        spread: bool,
        pos: Pos,
    ) -> Result<Vec<Value>> {
        match name {
            "len" => {
                let value = self.eval(frame, expr_arg(args, 0, name, pos)?)?;
                let n = match &value {
                    Value::Str(s) => s.len(),
                    Value::Slice(s) => s.len,
                    Value::Map(m) => m.len(),
                    other => {
                        return Err(GoError::runtime(
                            pos,
                            format!("invalid argument: value of type {} for built-in len", other.type_name()),
                        ))
                    }
                };
                Ok(vec![Value::Int(n as i64)])
            }
            "append" => {
                let slice = match self.eval(frame, expr_arg(args, 0, name, pos)?)? {
                    Value::Slice(slice) => slice,
                    other => {
                        return Err(GoError::runtime(
                            pos,
                            format!("invalid argument: value of type {} is not a slice", other.type_name()),
                        ))
                    }
                };
                let mut items = Vec::with_capacity(args.len().saturating_sub(1));
                for (i, arg) in args.iter().enumerate().skip(1) {
                    let value = self.eval_with(frame, arg, Some(&slice.elem))?;
                    if spread && i + 1 == args.len() {
                        match value {
                            Value::Slice(more) => {
                                for item in more.items()? {
                                    items.push(item.assign_to(&slice.elem)?);
                                }
                            }
                            Value::Nil => {}
                            other => {
                                return Err(GoError::runtime(
                                    pos,
                                    format!("cannot use ... with value of type {}", other.type_name()),
                                ))
                            }
                        }
                    } else {
                        items.push(value.assign_to(&slice.elem).map_err(|e| e.with_pos(arg.pos()))?);
                    }
                }
                Ok(vec![Value::Slice(slice.append(items)?)])
            }
            "make" => {
                let ty = self.type_arg(frame, expr_arg(args, 0, name, pos)?)?;
                match &ty {
                    Type::Slice(elem) => {
                        let len = self.size_arg(frame, args.get(1), "len")?.unwrap_or(0);
                        let cap = self.size_arg(frame, args.get(2), "cap")?.unwrap_or(len);
                        if cap < len {
                            return Err(GoError::panic("runtime error: makeslice: cap out of range"));
                        }
                        let backing = vec![Value::zero(elem); cap];
                        Ok(vec![Value::Slice(SliceValue {
                            elem: (**elem).clone(),
                            backing: Some(Rc::new(RefCell::new(backing))),
                            offset: 0,
                            len,
                        })])
                    }
                    Type::Map(key, elem) => {
                        if let Some(hint) = args.get(1) {
                            self.eval(frame, hint)?;
                        }
                        Ok(vec![Value::map_of(
                            (**key).clone(),
                            (**elem).clone(),
                            BTreeMap::new(),
                        )])
                    }
                    other => Err(GoError::runtime(
                        pos,
                        format!("invalid argument: cannot make {}", other),
                    )),
                }
            }
            "new" => {
                let ty = self.type_arg(frame, expr_arg(args, 0, name, pos)?)?;
                let zero = Value::zero(&ty);
                Ok(vec![Value::pointer_to(ty, zero)])
            }
            "delete" => {
                let map = self.eval(frame, expr_arg(args, 0, name, pos)?)?;
                let key_expr = expr_arg(args, 1, name, pos)?;
                match map {
                    Value::Map(map) => {
                        let key = self.map_key(frame, &map, key_expr)?;
                        map.remove(&key)?;
                        Ok(Vec::new())
                    }
                    other => Err(GoError::runtime(
                        pos,
                        format!("invalid argument: value of type {} is not a map", other.type_name()),
                    )),
                }
            }
            "panic" => {
                let value = self.eval(frame, expr_arg(args, 0, name, pos)?)?;
                Err(GoError::panic(value.to_string()))
            }
            other => Err(GoError::runtime(pos, format!("undefined: {}", other))),
        }
    }
}

/// Declared type of a new variable initialised with `value`.
fn typed(value: Value, declared: Option<&Type>) -> Result<(Value, Option<Type>)> {
    match declared {
        Some(ty) => Ok((value.assign_to(ty)?, Some(ty.clone()))),
        None => {
            let ty = value.static_type();
            Ok((value, ty))
        }
    }
}

fn describe_base(value: &Value) -> Base {
    match value {
        Value::Pointer(p) => Base::Pointer(p.clone()),
        Value::Struct(s) => Base::Struct(s.ty.clone()),
        Value::Nil => Base::Pointer(PointerValue {
            elem: Type::any(),
            target: None,
        }),
        other => Base::Other(other.type_name()),
    }
}

fn field_of(st: &StructType, name: &str, pos: Pos) -> Result<(usize, Type)> {
    let index = st
        .field_index(name)
        .ok_or_else(|| no_field(&st.to_string(), name, pos))?;
    let ty = st.fields[index].ty.clone();
    Ok((index, ty))
}

fn no_field(type_name: &str, name: &str, pos: Pos) -> GoError {
    GoError::runtime(
        pos,
        format!(
            "{}.{} undefined (type {} has no field or method {})",
            type_name, name, type_name, name
        ),
    )
}
