//! Recursive-descent parser for the Go subset

use crate::ast::*;
use crate::error::{GoError, Pos, Result};
use crate::lexer::{tokenize, Tok, Token};
use crate::stack::ensure_sufficient_stack;

/// Deepest nesting of expressions, types and statements accepted
pub const MAX_NESTING: usize = 1000;

/// Parse a complete source file.
pub fn parse_file(src: &str) -> Result<File> {
    let tokens = tokenize(src)?;
    Parser::new(tokens).file()
}

enum Simple {
    Stmt(Stmt),
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        expr: Expr,
        pos: Pos,
    },
}

enum ParamItem {
    Bare(String, Pos),
    Named(String, TypeExpr),
    Typed(TypeExpr),
}

struct Parser {
    tokens: Vec<Token>,
    idx: usize,
    /// Set while parsing control clauses, where `Name {` opens a block
    /// rather than a composite literal.
    no_lit: bool,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            idx: 0,
            no_lit: false,
            depth: 0,
        }
    }

    fn peek(&self) -> &Tok {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        self.tokens
            .get(self.idx + offset)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn pos(&self) -> Pos {
        self.tokens
            .get(self.idx)
            .or_else(|| self.tokens.last())
            .map(|t| t.pos)
            .unwrap_or_default()
    }

    fn advance(&mut self) -> Pos {
        let pos = self.pos();
        if self.idx < self.tokens.len() {
            self.idx += 1;
        }
        pos
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected<T>(&self, context: &str) -> Result<T> {
        Err(GoError::syntax(
            self.pos(),
            format!("unexpected {}, {}", self.peek().describe(), context),
        ))
    }

    fn expect(&mut self, tok: Tok, context: &str) -> Result<Pos> {
        if self.peek() == &tok {
            Ok(self.advance())
        } else {
            self.unexpected(context)
        }
    }

    fn ident(&mut self, context: &str) -> Result<(String, Pos)> {
        match self.peek().clone() {
            Tok::Ident(name) => {
                let pos = self.advance();
                Ok((name, pos))
            }
            _ => self.unexpected(context),
        }
    }

    fn skip_semis(&mut self) {
        while self.peek() == &Tok::Semi {
            self.advance();
        }
    }

    /// Statement terminator; optional before a closing `)` or `}`.
    fn end_of_stmt(&mut self, context: &str) -> Result<()> {
        match self.peek() {
            Tok::Semi => {
                self.advance();
                Ok(())
            }
            Tok::RParen | Tok::RBrace | Tok::Eof => Ok(()),
            _ => self.unexpected(context),
        }
    }

    fn with_literals<T>(&mut self, allowed: bool, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.no_lit;
        self.no_lit = !allowed;
        let out = f(self);
        self.no_lit = saved;
        out
    }

    /// Runs one level of a recursive production.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(GoError::syntax(
                self.pos(),
                format!("nesting exceeds the limit of {} levels", MAX_NESTING),
            ));
        }
        self.depth += 1;
        let out = ensure_sufficient_stack(|| f(self));
        self.depth -= 1;
        out
    }

    // ---- declarations ----

    fn file(mut self) -> Result<File> {
        self.skip_semis();
        let package_pos = self.expect(Tok::Package, "expected package clause")?;
        let (package, _) = self.ident("expected package name")?;
        self.end_of_stmt("after package clause")?;

        let mut imports = Vec::new();
        loop {
            self.skip_semis();
            if !self.eat(&Tok::Import) {
                break;
            }
            if self.eat(&Tok::LParen) {
                loop {
                    self.skip_semis();
                    if self.eat(&Tok::RParen) {
                        break;
                    }
                    imports.push(self.import_spec()?);
                    self.end_of_stmt("after import path")?;
                }
            } else {
                imports.push(self.import_spec()?);
            }
            self.end_of_stmt("after import declaration")?;
        }

        let mut decls = Vec::new();
        loop {
            self.skip_semis();
            match self.peek() {
                Tok::Eof => break,
                Tok::Func => decls.push(Decl::Func(self.func_decl()?)),
                Tok::Type => decls.extend(self.type_decl()?),
                Tok::Const => decls.extend(self.const_decl()?),
                Tok::Var => {
                    return Err(GoError::syntax(
                        self.pos(),
                        "package-level variables are not supported",
                    ))
                }
                Tok::Import => {
                    return Err(GoError::syntax(
                        self.pos(),
                        "imports must appear before other declarations",
                    ))
                }
                _ => return self.unexpected("expected declaration"),
            }
            self.end_of_stmt("after top level declaration")?;
        }

        Ok(File {
            package,
            package_pos,
            imports,
            decls,
        })
    }

    fn import_spec(&mut self) -> Result<Import> {
        let pos = self.pos();
        let alias = match self.peek().clone() {
            Tok::Ident(name) => {
                self.advance();
                if name == "_" {
                    return Err(GoError::syntax(pos, "blank imports are not supported"));
                }
                Some(name)
            }
            Tok::Dot => return Err(GoError::syntax(pos, "dot imports are not supported")),
            _ => None,
        };
        match self.peek().clone() {
            Tok::Str(path) => {
                self.advance();
                Ok(Import { path, alias, pos })
            }
            _ => self.unexpected("expected import path"),
        }
    }

    fn func_decl(&mut self) -> Result<FuncDecl> {
        let pos = self.expect(Tok::Func, "expected func")?;
        if self.peek() == &Tok::LParen {
            return Err(GoError::syntax(pos, "methods are not supported"));
        }
        let (name, _) = self.ident("expected function name")?;
        if self.peek() == &Tok::LBrack {
            return Err(GoError::syntax(self.pos(), "generic functions are not supported"));
        }
        let params = self.params()?;
        let results = self.results()?;
        if self.peek() != &Tok::LBrace {
            return self.unexpected("expected function body");
        }
        let body = self.block()?;
        Ok(FuncDecl {
            name,
            params,
            results,
            body,
            pos,
        })
    }

    fn params(&mut self) -> Result<Vec<Param>> {
        self.expect(Tok::LParen, "expected (")?;
        let mut items = Vec::new();
        loop {
            self.skip_semis();
            if self.peek() == &Tok::RParen {
                break;
            }
            let item = match self.peek().clone() {
                Tok::Ident(name) => {
                    let pos = self.advance();
                    match self.peek() {
                        Tok::Comma | Tok::RParen => ParamItem::Bare(name, pos),
                        Tok::Dot => {
                            return Err(GoError::syntax(
                                self.pos(),
                                "qualified types are not supported",
                            ))
                        }
                        Tok::Ellipsis => {
                            return Err(GoError::syntax(
                                self.pos(),
                                "variadic parameters are not supported",
                            ))
                        }
                        _ => ParamItem::Named(name, self.type_expr()?),
                    }
                }
                Tok::Ellipsis => {
                    return Err(GoError::syntax(
                        self.pos(),
                        "variadic parameters are not supported",
                    ))
                }
                _ => ParamItem::Typed(self.type_expr()?),
            };
            items.push(item);
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.skip_semis();
        self.expect(Tok::RParen, "expected )")?;

        let named = items.iter().any(|i| matches!(i, ParamItem::Named(..)));
        if !named {
            return Ok(items
                .into_iter()
                .map(|item| match item {
                    ParamItem::Bare(name, pos) => Param {
                        name: None,
                        ty: TypeExpr::Name(name, pos),
                    },
                    ParamItem::Typed(ty) | ParamItem::Named(_, ty) => Param { name: None, ty },
                })
                .collect());
        }

        // `a, b int` groups: bare names take the type of the next named entry.
        let mut params = Vec::with_capacity(items.len());
        let mut pending: Option<TypeExpr> = None;
        for item in items.into_iter().rev() {
            match item {
                ParamItem::Named(name, ty) => {
                    pending = Some(ty.clone());
                    params.push(Param {
                        name: Some(name),
                        ty,
                    });
                }
                ParamItem::Bare(name, pos) => match &pending {
                    Some(ty) => params.push(Param {
                        name: Some(name),
                        ty: ty.clone(),
                    }),
                    None => {
                        return Err(GoError::syntax(pos, "mixed named and unnamed parameters"))
                    }
                },
                ParamItem::Typed(_) => {
                    return Err(GoError::syntax(
                        self.pos(),
                        "mixed named and unnamed parameters",
                    ))
                }
            }
        }
        params.reverse();
        Ok(params)
    }

    fn results(&mut self) -> Result<Vec<Param>> {
        if self.peek() == &Tok::LParen {
            return self.params();
        }
        if self.starts_type() {
            return Ok(vec![Param {
                name: None,
                ty: self.type_expr()?,
            }]);
        }
        Ok(Vec::new())
    }

    fn starts_type(&self) -> bool {
        matches!(
            self.peek(),
            Tok::Ident(_)
                | Tok::Star
                | Tok::LBrack
                | Tok::Map
                | Tok::Struct
                | Tok::Interface
                | Tok::Func
        )
    }

    fn type_decl(&mut self) -> Result<Vec<Decl>> {
        self.expect(Tok::Type, "expected type")?;
        let mut decls = Vec::new();
        if self.eat(&Tok::LParen) {
            loop {
                self.skip_semis();
                if self.eat(&Tok::RParen) {
                    break;
                }
                decls.push(Decl::Type(self.type_spec()?));
                self.end_of_stmt("after type declaration")?;
            }
        } else {
            decls.push(Decl::Type(self.type_spec()?));
        }
        Ok(decls)
    }

    fn type_spec(&mut self) -> Result<TypeDecl> {
        let (name, pos) = self.ident("expected type name")?;
        if self.peek() == &Tok::LBrack {
            return Err(GoError::syntax(self.pos(), "generic types are not supported"));
        }
        self.eat(&Tok::Assign);
        let ty = self.type_expr()?;
        Ok(TypeDecl { name, ty, pos })
    }

    fn const_decl(&mut self) -> Result<Vec<Decl>> {
        self.expect(Tok::Const, "expected const")?;
        let mut decls = Vec::new();
        if self.eat(&Tok::LParen) {
            loop {
                self.skip_semis();
                if self.eat(&Tok::RParen) {
                    break;
                }
                decls.extend(self.const_spec()?.into_iter().map(Decl::Const));
                self.end_of_stmt("after const declaration")?;
            }
        } else {
            decls.extend(self.const_spec()?.into_iter().map(Decl::Const));
        }
        Ok(decls)
    }

    fn const_spec(&mut self) -> Result<Vec<ConstDecl>> {
        let mut names = vec![self.ident("expected constant name")?];
        while self.eat(&Tok::Comma) {
            names.push(self.ident("expected constant name")?);
        }
        let ty = if self.peek() != &Tok::Assign {
            Some(self.type_expr()?)
        } else {
            None
        };
        if !self.eat(&Tok::Assign) {
            return Err(GoError::syntax(
                self.pos(),
                "missing init expr for const declaration",
            ));
        }
        let values = self.expr_list()?;
        if values.len() != names.len() {
            return Err(GoError::syntax(
                names[0].1,
                format!(
                    "assignment mismatch: {} constants but {} values",
                    names.len(),
                    values.len()
                ),
            ));
        }
        Ok(names
            .into_iter()
            .zip(values)
            .map(|((name, pos), value)| ConstDecl {
                name,
                ty: ty.clone(),
                value,
                pos,
            })
            .collect())
    }

    // ---- types ----

    fn type_expr(&mut self) -> Result<TypeExpr> {
        self.nested(Self::type_literal)
    }

    fn type_literal(&mut self) -> Result<TypeExpr> {
        match self.peek().clone() {
            Tok::Ident(name) => {
                let pos = self.advance();
                if self.peek() == &Tok::Dot {
                    return Err(GoError::syntax(pos, "qualified types are not supported"));
                }
                Ok(TypeExpr::Name(name, pos))
            }
            Tok::Star => {
                self.advance();
                Ok(TypeExpr::Pointer(Box::new(self.type_expr()?)))
            }
            Tok::LBrack => {
                self.advance();
                if self.peek() != &Tok::RBrack {
                    return Err(GoError::syntax(self.pos(), "array types are not supported"));
                }
                self.advance();
                Ok(TypeExpr::Slice(Box::new(self.type_expr()?)))
            }
            Tok::Map => {
                self.advance();
                self.expect(Tok::LBrack, "expected [ after map")?;
                let key = self.type_expr()?;
                self.expect(Tok::RBrack, "expected ]")?;
                let value = self.type_expr()?;
                Ok(TypeExpr::Map(Box::new(key), Box::new(value)))
            }
            Tok::Struct => self.struct_type(),
            Tok::Interface => self.interface_type(),
            Tok::Func => {
                self.advance();
                let params = self.params()?.into_iter().map(|p| p.ty).collect();
                let results = self.results()?.into_iter().map(|p| p.ty).collect();
                Ok(TypeExpr::Func(params, results))
            }
            Tok::LParen => {
                self.advance();
                let ty = self.type_expr()?;
                self.expect(Tok::RParen, "expected )")?;
                Ok(ty)
            }
            Tok::Unsupported(word) => Err(GoError::syntax(
                self.pos(),
                format!("{} types are not supported", word),
            )),
            _ => self.unexpected("expected type"),
        }
    }

    fn struct_type(&mut self) -> Result<TypeExpr> {
        self.expect(Tok::Struct, "expected struct")?;
        self.expect(Tok::LBrace, "expected {")?;
        let mut fields = Vec::new();
        loop {
            self.skip_semis();
            if self.eat(&Tok::RBrace) {
                break;
            }
            let (first, pos) = self.ident("expected field name")?;
            if matches!(self.peek(), Tok::Semi | Tok::RBrace | Tok::Str(_) | Tok::Dot) {
                return Err(GoError::syntax(pos, "embedded fields are not supported"));
            }
            let mut names = vec![(first, pos)];
            while self.eat(&Tok::Comma) {
                names.push(self.ident("expected field name")?);
            }
            let ty = self.type_expr()?;
            let tag = match self.peek().clone() {
                Tok::Str(tag) => {
                    self.advance();
                    Some(tag)
                }
                _ => None,
            };
            for (name, pos) in names {
                fields.push(FieldDecl {
                    name,
                    ty: ty.clone(),
                    tag: tag.clone(),
                    pos,
                });
            }
            self.end_of_stmt("after struct field")?;
        }
        Ok(TypeExpr::Struct(fields))
    }

    fn interface_type(&mut self) -> Result<TypeExpr> {
        self.expect(Tok::Interface, "expected interface")?;
        self.expect(Tok::LBrace, "expected {")?;
        let mut methods = Vec::new();
        loop {
            self.skip_semis();
            if self.eat(&Tok::RBrace) {
                break;
            }
            let (name, pos) = self.ident("expected method name")?;
            if self.peek() != &Tok::LParen {
                return Err(GoError::syntax(pos, "embedded interfaces are not supported"));
            }
            self.params()?;
            self.results()?;
            methods.push(name);
            self.end_of_stmt("after interface method")?;
        }
        Ok(TypeExpr::Interface(methods))
    }

    // ---- statements ----

    fn block(&mut self) -> Result<Block> {
        self.expect(Tok::LBrace, "expected {")?;
        let stmts = self.with_literals(true, |p| p.stmt_list())?;
        self.expect(Tok::RBrace, "expected }")?;
        Ok(Block { stmts })
    }

    fn stmt_list(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_semis();
            if matches!(self.peek(), Tok::RBrace | Tok::Eof | Tok::Case | Tok::Default) {
                break;
            }
            stmts.push(self.stmt()?);
            if !matches!(self.peek(), Tok::RBrace | Tok::Case | Tok::Default) {
                self.end_of_stmt("at end of statement")?;
            }
        }
        Ok(stmts)
    }

    fn stmt(&mut self) -> Result<Stmt> {
        self.nested(Self::statement)
    }

    fn statement(&mut self) -> Result<Stmt> {
        match self.peek().clone() {
            Tok::Var => self.var_stmt(),
            Tok::Return => {
                let pos = self.advance();
                let values = if matches!(self.peek(), Tok::Semi | Tok::RBrace) {
                    Vec::new()
                } else {
                    self.expr_list()?
                };
                Ok(Stmt::Return { values, pos })
            }
            Tok::If => self.if_stmt(),
            Tok::For => self.for_stmt(),
            Tok::Switch => self.switch_stmt(),
            Tok::LBrace => Ok(Stmt::Block(self.block()?)),
            Tok::Break => Ok(Stmt::Break(self.advance())),
            Tok::Continue => Ok(Stmt::Continue(self.advance())),
            Tok::Const | Tok::Type => Err(GoError::syntax(
                self.pos(),
                "local type and const declarations are not supported",
            )),
            Tok::Unsupported(word) => Err(GoError::syntax(
                self.pos(),
                format!("{} statements are not supported", word),
            )),
            _ => match self.simple_stmt()? {
                Simple::Stmt(stmt) => Ok(stmt),
                Simple::Range { pos, .. } => {
                    Err(GoError::syntax(pos, "range clause outside of for statement"))
                }
            },
        }
    }

    fn var_stmt(&mut self) -> Result<Stmt> {
        let pos = self.expect(Tok::Var, "expected var")?;
        if self.peek() == &Tok::LParen {
            return Err(GoError::syntax(
                pos,
                "grouped var declarations are not supported inside functions",
            ));
        }
        let mut names = vec![self.ident("expected variable name")?.0];
        while self.eat(&Tok::Comma) {
            names.push(self.ident("expected variable name")?.0);
        }
        let ty = if self.peek() != &Tok::Assign {
            Some(self.type_expr()?)
        } else {
            None
        };
        let values = if self.eat(&Tok::Assign) {
            self.expr_list()?
        } else {
            Vec::new()
        };
        if ty.is_none() && values.is_empty() {
            return self.unexpected("expected type or initializer");
        }
        Ok(Stmt::Var {
            names,
            ty,
            values,
            pos,
        })
    }

    fn simple_stmt(&mut self) -> Result<Simple> {
        let pos = self.pos();
        if self.eat(&Tok::Range) {
            let expr = self.expr()?;
            return Ok(Simple::Range {
                key: None,
                value: None,
                define: false,
                expr,
                pos,
            });
        }

        let mut lhs = self.expr_list()?;
        let op = match self.peek() {
            Tok::Define => {
                let op_pos = self.advance();
                if self.eat(&Tok::Range) {
                    return self.range_clause(lhs, true, op_pos);
                }
                let mut names = Vec::with_capacity(lhs.len());
                for expr in &lhs {
                    match expr {
                        Expr::Ident(name, _) => names.push(name.clone()),
                        other => {
                            return Err(GoError::syntax(
                                other.pos(),
                                "non-name on left side of :=",
                            ))
                        }
                    }
                }
                let values = self.expr_list()?;
                return Ok(Simple::Stmt(Stmt::Define {
                    names,
                    values,
                    pos: op_pos,
                }));
            }
            Tok::Assign => {
                let op_pos = self.advance();
                if self.eat(&Tok::Range) {
                    return self.range_clause(lhs, false, op_pos);
                }
                let values = self.expr_list()?;
                return Ok(Simple::Stmt(Stmt::Assign {
                    targets: lhs,
                    op: AssignOp::Assign,
                    values,
                    pos: op_pos,
                }));
            }
            Tok::PlusAssign => AssignOp::Add,
            Tok::MinusAssign => AssignOp::Sub,
            Tok::StarAssign => AssignOp::Mul,
            Tok::SlashAssign => AssignOp::Div,
            Tok::PercentAssign => AssignOp::Rem,
            Tok::Inc | Tok::Dec => {
                let inc = self.peek() == &Tok::Inc;
                let op_pos = self.advance();
                if lhs.len() != 1 {
                    return Err(GoError::syntax(op_pos, "unexpected ++/-- on expression list"));
                }
                return Ok(Simple::Stmt(Stmt::IncDec {
                    target: lhs.remove(0),
                    inc,
                    pos: op_pos,
                }));
            }
            _ => {
                if lhs.len() != 1 {
                    return self.unexpected("expected := or = or comma");
                }
                return Ok(Simple::Stmt(Stmt::Expr(lhs.remove(0))));
            }
        };
        let op_pos = self.advance();
        if lhs.len() != 1 {
            return Err(GoError::syntax(
                op_pos,
                "assignment operation requires single-valued expressions",
            ));
        }
        let value = self.expr()?;
        Ok(Simple::Stmt(Stmt::Assign {
            targets: lhs,
            op,
            values: vec![value],
            pos: op_pos,
        }))
    }

    fn range_clause(&mut self, lhs: Vec<Expr>, define: bool, pos: Pos) -> Result<Simple> {
        if lhs.len() > 2 {
            return Err(GoError::syntax(pos, "range clause permits at most two iteration variables"));
        }
        let mut vars = lhs.into_iter();
        let key = vars.next();
        let value = vars.next();
        let expr = self.expr()?;
        Ok(Simple::Range {
            key,
            value,
            define,
            expr,
            pos,
        })
    }

    fn into_stmt(simple: Simple) -> Result<Stmt> {
        match simple {
            Simple::Stmt(stmt) => Ok(stmt),
            Simple::Range { pos, .. } => Err(GoError::syntax(pos, "unexpected range clause")),
        }
    }

    fn into_cond(simple: Simple, pos: Pos, what: &str) -> Result<Expr> {
        match simple {
            Simple::Stmt(Stmt::Expr(expr)) => Ok(expr),
            _ => Err(GoError::syntax(
                pos,
                format!("cannot use statement as {} condition", what),
            )),
        }
    }

    fn if_stmt(&mut self) -> Result<Stmt> {
        let pos = self.expect(Tok::If, "expected if")?;
        let (init, cond) = self.with_literals(false, |p| {
            let head_pos = p.pos();
            let first = p.simple_stmt()?;
            if p.eat(&Tok::Semi) {
                let init = Self::into_stmt(first)?;
                let cond = p.expr()?;
                Ok((Some(Box::new(init)), cond))
            } else {
                Ok((None, Self::into_cond(first, head_pos, "if")?))
            }
        })?;
        let then = self.block()?;
        let els = if self.eat(&Tok::Else) {
            match self.peek() {
                Tok::If => Some(Box::new(self.if_stmt()?)),
                Tok::LBrace => Some(Box::new(Stmt::Block(self.block()?))),
                _ => return self.unexpected("expected if statement or block after else"),
            }
        } else {
            None
        };
        Ok(Stmt::If {
            init,
            cond,
            then,
            els,
            pos,
        })
    }

    fn for_stmt(&mut self) -> Result<Stmt> {
        let pos = self.expect(Tok::For, "expected for")?;
        if self.peek() == &Tok::LBrace {
            let body = self.block()?;
            return Ok(Stmt::For {
                init: None,
                cond: None,
                post: None,
                body,
                pos,
            });
        }

        enum Head {
            Loop(Option<Box<Stmt>>, Option<Expr>, Option<Box<Stmt>>),
            Range(Option<Expr>, Option<Expr>, bool, Expr),
        }

        let head = self.with_literals(false, |p| {
            let head_pos = p.pos();
            let first = if p.peek() == &Tok::Semi {
                None
            } else {
                Some(p.simple_stmt()?)
            };
            if let Some(Simple::Range {
                key,
                value,
                define,
                expr,
                ..
            }) = first
            {
                return Ok(Head::Range(key, value, define, expr));
            }
            if p.eat(&Tok::Semi) {
                let init = first.map(Self::into_stmt).transpose()?.map(Box::new);
                let cond = if p.peek() == &Tok::Semi {
                    None
                } else {
                    Some(p.expr()?)
                };
                p.expect(Tok::Semi, "expected for loop condition")?;
                let post = if p.peek() == &Tok::LBrace {
                    None
                } else {
                    let post_pos = p.pos();
                    match Self::into_stmt(p.simple_stmt()?)? {
                        Stmt::Define { .. } => {
                            return Err(GoError::syntax(
                                post_pos,
                                "cannot declare in post statement of for loop",
                            ))
                        }
                        stmt => Some(Box::new(stmt)),
                    }
                };
                Ok(Head::Loop(init, cond, post))
            } else {
                let cond = match first {
                    Some(simple) => Some(Self::into_cond(simple, head_pos, "for")?),
                    None => None,
                };
                Ok(Head::Loop(None, cond, None))
            }
        })?;

        let body = self.block()?;
        Ok(match head {
            Head::Loop(init, cond, post) => Stmt::For {
                init,
                cond,
                post,
                body,
                pos,
            },
            Head::Range(key, value, define, expr) => Stmt::Range {
                key,
                value,
                define,
                expr,
                body,
                pos,
            },
        })
    }

    fn switch_stmt(&mut self) -> Result<Stmt> {
        let pos = self.expect(Tok::Switch, "expected switch")?;
        let (init, tag) = self.with_literals(false, |p| {
            if p.peek() == &Tok::LBrace {
                return Ok((None, None));
            }
            let head_pos = p.pos();
            let first = if p.peek() == &Tok::Semi {
                None
            } else {
                Some(p.simple_stmt()?)
            };
            if p.eat(&Tok::Semi) {
                let init = first.map(Self::into_stmt).transpose()?.map(Box::new);
                let tag = if p.peek() == &Tok::LBrace {
                    None
                } else {
                    Some(p.expr()?)
                };
                Ok((init, tag))
            } else {
                match first {
                    Some(simple) => Ok((None, Some(Self::into_cond(simple, head_pos, "switch")?))),
                    None => Ok((None, None)),
                }
            }
        })?;

        self.expect(Tok::LBrace, "expected { after switch clause")?;
        let mut cases = Vec::new();
        let mut seen_default = false;
        loop {
            self.skip_semis();
            match self.peek() {
                Tok::RBrace => {
                    self.advance();
                    break;
                }
                Tok::Case => {
                    let case_pos = self.advance();
                    let exprs = self.with_literals(true, |p| p.expr_list())?;
                    self.expect(Tok::Colon, "expected :")?;
                    let body = self.with_literals(true, |p| p.stmt_list())?;
                    cases.push(CaseClause {
                        exprs,
                        is_default: false,
                        body,
                        pos: case_pos,
                    });
                }
                Tok::Default => {
                    let case_pos = self.advance();
                    if seen_default {
                        return Err(GoError::syntax(case_pos, "multiple defaults in switch"));
                    }
                    seen_default = true;
                    self.expect(Tok::Colon, "expected :")?;
                    let body = self.with_literals(true, |p| p.stmt_list())?;
                    cases.push(CaseClause {
                        exprs: Vec::new(),
                        is_default: true,
                        body,
                        pos: case_pos,
                    });
                }
                _ => return self.unexpected("expected case or default or }"),
            }
        }
        Ok(Stmt::Switch {
            init,
            tag,
            cases,
            pos,
        })
    }

    // ---- expressions ----

    fn expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut exprs = vec![self.expr()?];
        while self.eat(&Tok::Comma) {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn expr(&mut self) -> Result<Expr> {
        self.binary(1)
    }

    fn binary_op(tok: &Tok) -> Option<BinaryOp> {
        let op = match tok {
            Tok::Plus => BinaryOp::Add,
            Tok::Minus => BinaryOp::Sub,
            Tok::Star => BinaryOp::Mul,
            Tok::Slash => BinaryOp::Div,
            Tok::Percent => BinaryOp::Rem,
            Tok::Amp => BinaryOp::BitAnd,
            Tok::Pipe => BinaryOp::BitOr,
            Tok::Caret => BinaryOp::BitXor,
            Tok::Shl => BinaryOp::Shl,
            Tok::Shr => BinaryOp::Shr,
            Tok::AndAnd => BinaryOp::And,
            Tok::OrOr => BinaryOp::Or,
            Tok::EqEq => BinaryOp::Eq,
            Tok::NotEq => BinaryOp::Ne,
            Tok::Lt => BinaryOp::Lt,
            Tok::Le => BinaryOp::Le,
            Tok::Gt => BinaryOp::Gt,
            Tok::Ge => BinaryOp::Ge,
            _ => return None,
        };
        Some(op)
    }

    fn binary(&mut self, min_prec: u8) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some(op) = Self::binary_op(self.peek()) {
            if op.precedence() < min_prec {
                break;
            }
            let pos = self.advance();
            let rhs = self.binary(op.precedence() + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        self.nested(Self::unary_expr)
    }

    fn unary_expr(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Tok::Minus => UnaryOp::Neg,
            Tok::Plus => UnaryOp::Plus,
            Tok::Not => UnaryOp::Not,
            Tok::Amp => UnaryOp::Addr,
            Tok::Star => UnaryOp::Deref,
            Tok::Caret => UnaryOp::BitNot,
            _ => return self.primary(),
        };
        let pos = self.advance();
        let expr = self.unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
            pos,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        let mut expr = self.operand()?;
        loop {
            match self.peek() {
                Tok::Dot => {
                    let pos = self.advance();
                    if self.peek() == &Tok::LParen {
                        return Err(GoError::syntax(pos, "type assertions are not supported"));
                    }
                    let (name, _) = self.ident("expected name after .")?;
                    expr = Expr::Selector {
                        expr: Box::new(expr),
                        name,
                        pos,
                    };
                }
                Tok::LBrack => {
                    let pos = self.advance();
                    expr = self.with_literals(true, |p| p.index_or_slice(expr, pos))?;
                }
                Tok::LParen => {
                    let pos = self.advance();
                    let (args, spread) = self.with_literals(true, |p| p.call_args())?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        spread,
                        pos,
                    };
                }
                Tok::LBrace if !self.no_lit => {
                    let Expr::Ident(name, pos) = &expr else {
                        break;
                    };
                    let ty = TypeExpr::Name(name.clone(), *pos);
                    let pos = *pos;
                    expr = self.composite_body(Some(ty), pos)?;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn index_or_slice(&mut self, expr: Expr, pos: Pos) -> Result<Expr> {
        if self.eat(&Tok::Colon) {
            let hi = if self.peek() == &Tok::RBrack {
                None
            } else {
                Some(Box::new(self.expr()?))
            };
            self.expect(Tok::RBrack, "expected ]")?;
            return Ok(Expr::SliceExpr {
                expr: Box::new(expr),
                lo: None,
                hi,
                pos,
            });
        }
        let index = self.expr()?;
        if self.eat(&Tok::Colon) {
            let hi = if self.peek() == &Tok::RBrack {
                None
            } else {
                Some(Box::new(self.expr()?))
            };
            self.expect(Tok::RBrack, "expected ]")?;
            return Ok(Expr::SliceExpr {
                expr: Box::new(expr),
                lo: Some(Box::new(index)),
                hi,
                pos,
            });
        }
        self.expect(Tok::RBrack, "expected ]")?;
        Ok(Expr::Index {
            expr: Box::new(expr),
            index: Box::new(index),
            pos,
        })
    }

    fn call_args(&mut self) -> Result<(Vec<Expr>, bool)> {
        let mut args = Vec::new();
        let mut spread = false;
        loop {
            self.skip_semis();
            if self.peek() == &Tok::RParen {
                break;
            }
            if spread {
                return self.unexpected("can only use ... with final argument");
            }
            args.push(self.expr()?);
            if self.eat(&Tok::Ellipsis) {
                spread = true;
            }
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.skip_semis();
        self.expect(Tok::RParen, "expected ) in argument list")?;
        Ok((args, spread))
    }

    fn operand(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            Tok::Int(v) => Ok(Expr::Int(v, self.advance())),
            Tok::Float(v) => Ok(Expr::Float(v, self.advance())),
            Tok::Str(s) => Ok(Expr::Str(s, self.advance())),
            Tok::Ident(name) => Ok(Expr::Ident(name, self.advance())),
            Tok::LParen => {
                self.advance();
                let expr = self.with_literals(true, |p| p.expr())?;
                self.expect(Tok::RParen, "expected )")?;
                Ok(expr)
            }
            Tok::LBrack | Tok::Map | Tok::Struct | Tok::Interface => {
                let pos = self.pos();
                let ty = self.type_expr()?;
                if self.peek() == &Tok::LBrace {
                    self.composite_body(Some(ty), pos)
                } else {
                    Ok(Expr::Type(ty, pos))
                }
            }
            Tok::Func => Err(GoError::syntax(
                self.pos(),
                "function literals are not supported",
            )),
            _ => self.unexpected("expected expression"),
        }
    }

    fn composite_body(&mut self, ty: Option<TypeExpr>, pos: Pos) -> Result<Expr> {
        self.expect(Tok::LBrace, "expected {")?;
        let elems = self.with_literals(true, |p| {
            let mut elems = Vec::new();
            loop {
                p.skip_semis();
                if p.peek() == &Tok::RBrace {
                    break;
                }
                let first = p.element_value()?;
                let elem = if p.eat(&Tok::Colon) {
                    Element {
                        key: Some(first),
                        value: p.element_value()?,
                    }
                } else {
                    Element {
                        key: None,
                        value: first,
                    }
                };
                elems.push(elem);
                if !p.eat(&Tok::Comma) {
                    p.skip_semis();
                    break;
                }
            }
            Ok(elems)
        })?;
        self.expect(Tok::RBrace, "expected } in composite literal")?;
        Ok(Expr::Composite { ty, elems, pos })
    }

    fn element_value(&mut self) -> Result<Expr> {
        if self.peek() == &Tok::LBrace {
            let pos = self.pos();
            return self.nested(|p| p.composite_body(None, pos));
        }
        self.expr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> File {
        parse_file(src).unwrap()
    }

    fn func<'a>(file: &'a File, name: &str) -> &'a FuncDecl {
        file.decls
            .iter()
            .find_map(|d| match d {
                Decl::Func(f) if f.name == name => Some(f),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn parses_package_imports_and_functions() {
        let file = parse(
            r#"package lib

import (
    "errors"
    "strings"
)

func Echo(s string) string { return s }
"#,
        );
        assert_eq!(file.package, "lib");
        assert_eq!(file.imports.len(), 2);
        assert_eq!(file.imports[1].local_name(), "strings");
        let echo = func(&file, "Echo");
        assert_eq!(echo.params.len(), 1);
        assert_eq!(echo.params[0].name.as_deref(), Some("s"));
        assert_eq!(echo.results.len(), 1);
    }

    #[test]
    fn groups_parameter_names_sharing_a_type() {
        let file = parse("package lib\nfunc Div(a, b int) (int, error) { return a / b, nil }\n");
        let div = func(&file, "Div");
        assert_eq!(div.params.len(), 2);
        assert!(matches!(&div.params[0].ty, TypeExpr::Name(n, _) if n == "int"));
        assert_eq!(div.results.len(), 2);
        assert!(div.results.iter().all(|r| r.name.is_none()));
    }

    #[test]
    fn parses_struct_with_tags() {
        let file = parse(
            "package lib\ntype Person struct {\n\tFirstName string `tf:\"first\"`\n\tAge int\n}\n",
        );
        match &file.decls[0] {
            Decl::Type(TypeDecl {
                ty: TypeExpr::Struct(fields),
                ..
            }) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].tag.as_deref(), Some("tf:\"first\""));
                assert_eq!(fields[1].tag, None);
            }
            other => panic!("unexpected decl {:?}", other),
        }
    }

    #[test]
    fn composite_literal_not_parsed_in_if_header() {
        let file = parse("package lib\nfunc F(x int) int { if x == y { return 1 }; return 0 }\n");
        let f = func(&file, "F");
        assert!(matches!(f.body.stmts[0], Stmt::If { .. }));
    }

    #[test]
    fn parses_three_clause_and_range_loops() {
        let file = parse(
            "package lib\nfunc F(xs []int) int {\n\tn := 0\n\tfor i := 0; i < 3; i++ { n += i }\n\tfor _, x := range xs { n += x }\n\treturn n\n}\n",
        );
        let f = func(&file, "F");
        assert!(matches!(f.body.stmts[1], Stmt::For { .. }));
        assert!(matches!(f.body.stmts[2], Stmt::Range { define: true, .. }));
    }

    #[test]
    fn parses_nested_composite_literals_with_elided_types() {
        let file = parse(
            "package lib\ntype P struct { A int }\nfunc F() []P { return []P{{A: 1}, {2}} }\n",
        );
        let f = func(&file, "F");
        match &f.body.stmts[0] {
            Stmt::Return { values, .. } => match &values[0] {
                Expr::Composite { ty: Some(_), elems, .. } => {
                    assert_eq!(elems.len(), 2);
                    assert!(matches!(elems[0].value, Expr::Composite { ty: None, .. }));
                }
                other => panic!("unexpected expr {:?}", other),
            },
            other => panic!("unexpected stmt {:?}", other),
        }
    }

    #[test]
    fn parses_switch_statement() {
        let file = parse(
            "package lib\nfunc F(x int) string {\n\tswitch x {\n\tcase 1, 2:\n\t\treturn \"low\"\n\tdefault:\n\t\treturn \"high\"\n\t}\n}\n",
        );
        match &func(&file, "F").body.stmts[0] {
            Stmt::Switch { tag, cases, .. } => {
                assert!(tag.is_some());
                assert_eq!(cases.len(), 2);
                assert_eq!(cases[0].exprs.len(), 2);
                assert!(cases[1].is_default);
            }
            other => panic!("unexpected stmt {:?}", other),
        }
    }

    #[test]
    fn respects_operator_precedence() {
        let file = parse("package lib\nfunc F() int { return 1 + 2 * 3 }\n");
        match &func(&file, "F").body.stmts[0] {
            Stmt::Return { values, .. } => match &values[0] {
                Expr::Binary { op, rhs, .. } => {
                    assert_eq!(*op, BinaryOp::Add);
                    assert!(matches!(**rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
                }
                other => panic!("unexpected expr {:?}", other),
            },
            other => panic!("unexpected stmt {:?}", other),
        }
    }

    #[test]
    fn rejects_methods_and_package_vars() {
        let err = parse_file("package lib\nfunc (p P) Name() string { return \"\" }\n").unwrap_err();
        assert!(err.to_string().contains("methods are not supported"));

        let err = parse_file("package lib\nvar x = 1\n").unwrap_err();
        assert!(err.to_string().contains("package-level variables"));
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let depth = MAX_NESTING * 3;
        let src = format!(
            "package lib\nfunc F() int {{ return {}1{} }}\n",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        let err = parse_file(&src).unwrap_err();
        assert!(matches!(err, GoError::Syntax { .. }), "{:?}", err);
        assert!(err.to_string().contains("nesting exceeds the limit"), "{}", err);

        let src = format!("package lib\ntype T {}int\n", "[]".repeat(depth));
        assert!(parse_file(&src).is_err());
    }

    #[test]
    fn nesting_below_the_limit_parses() {
        let depth = MAX_NESTING / 2;
        let src = format!(
            "package lib\nfunc F() int {{ return {}1{} }}\n",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        parse(&src);
    }

    #[test]
    fn missing_package_clause_is_an_error() {
        let err = parse_file("func F() {}\n").unwrap_err();
        assert!(err.to_string().contains("expected package clause"));
    }
}
