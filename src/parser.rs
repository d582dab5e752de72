use std::rc::Rc;

use crate::{
    ast::{
        BinaryOp, Expr, ExprKind, FunctionBody, Literal, LogicalOp, Program, Stmt, StmtKind,
        UnaryOp,
    },
    buffer::TextBuffer,
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    lexer::{Keyword, Lexer, Token, TokenKind},
};

/// Statements and expressions nested deeper than this are rejected, keeping
/// both parsing and evaluation within the native stack.
pub const MAX_NESTING_DEPTH: usize = 96;

pub fn parse_program(source: &str, scratch: &mut TextBuffer) -> Result<Program, Diagnostic> {
    let tokens = Lexer::new(source, scratch).tokenize()?;
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
    function_depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            depth: 0,
            function_depth: 0,
        }
    }

    fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut items = Vec::new();
        while !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        Ok(Program { items })
    }

    fn parse_block(&mut self) -> Result<(Vec<Stmt>, SourceSpan), Diagnostic> {
        let open = self.consume(TokenKind::LBrace, "expected `{`")?;
        let mut items = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        let close = self.consume(TokenKind::RBrace, "expected `}` to close block")?;
        Ok((items, SourceSpan::new(open.span.start, close.span.end)))
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        self.descend()?;
        let stmt = self.statement();
        self.depth -= 1;
        stmt
    }

    fn statement(&mut self) -> Result<Stmt, Diagnostic> {
        match self.peek_kind() {
            TokenKind::Keyword(Keyword::Var) => self.parse_var_decl(),
            TokenKind::Keyword(Keyword::Function)
                if self.peek_kind_at(1) == TokenKind::Identifier =>
            {
                self.parse_function_decl()
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::LBrace => {
                let (items, span) = self.parse_block()?;
                Ok(Stmt {
                    kind: StmtKind::Block(items),
                    span,
                })
            }
            TokenKind::Semicolon => {
                let token = self.advance();
                Ok(Stmt {
                    kind: StmtKind::Empty,
                    span: token.span,
                })
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let var_token = self.advance();
        let name = self.consume_identifier("expected variable name after `var`")?;
        let initializer = if self.matches(TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let end = initializer
            .as_ref()
            .map(|expr| expr.span.end)
            .unwrap_or(name.span.end);
        self.consume_optional_semicolon();
        Ok(Stmt {
            kind: StmtKind::Var {
                name: name.lexeme,
                initializer,
            },
            span: SourceSpan::new(var_token.span.start, end),
        })
    }

    fn parse_function_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let (function, span) = self.parse_function()?;
        Ok(Stmt {
            kind: StmtKind::Function(function),
            span,
        })
    }

    /// Parses `function [name](params) { body }` starting at the keyword.
    fn parse_function(&mut self) -> Result<(Rc<FunctionBody>, SourceSpan), Diagnostic> {
        let keyword = self.advance();
        let name = if self.check(TokenKind::Identifier) {
            Some(self.advance().lexeme)
        } else {
            None
        };
        self.consume(TokenKind::LParen, "expected `(` before parameters")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.consume_identifier("expected parameter name")?.lexeme);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected `)` after parameters")?;
        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;
        let (body, body_span) = body?;
        Ok((
            Rc::new(FunctionBody { name, params, body }),
            SourceSpan::new(keyword.span.start, body_span.end),
        ))
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let if_token = self.advance();
        let condition = self.parse_condition()?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.matches_keyword(Keyword::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        let end = else_branch
            .as_ref()
            .map(|stmt| stmt.span.end)
            .unwrap_or(then_branch.span.end);
        Ok(Stmt {
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            span: SourceSpan::new(if_token.span.start, end),
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let while_token = self.advance();
        let condition = self.parse_condition()?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt {
            span: SourceSpan::new(while_token.span.start, body.span.end),
            kind: StmtKind::While { condition, body },
        })
    }

    fn parse_condition(&mut self) -> Result<Expr, Diagnostic> {
        self.consume(TokenKind::LParen, "expected `(` before condition")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RParen, "expected `)` after condition")?;
        Ok(condition)
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let return_token = self.advance();
        if self.function_depth == 0 {
            return Err(Diagnostic::new(
                DiagnosticKind::Parser,
                "`return` outside of a function body",
            )
            .with_span(return_token.span));
        }
        let value = if self.check(TokenKind::Semicolon)
            || self.check(TokenKind::RBrace)
            || self.check(TokenKind::Eof)
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let end = value
            .as_ref()
            .map(|expr| expr.span.end)
            .unwrap_or(return_token.span.end);
        self.consume_optional_semicolon();
        Ok(Stmt {
            kind: StmtKind::Return(value),
            span: SourceSpan::new(return_token.span.start, end),
        })
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let expr = self.parse_expression()?;
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: expr.span,
            kind: StmtKind::Expr(expr),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.descend()?;
        let expr = self.parse_assignment();
        self.depth -= 1;
        expr
    }

    fn parse_assignment(&mut self) -> Result<Expr, Diagnostic> {
        let expr = self.parse_or()?;
        if self.matches(TokenKind::Assign) {
            let equals = self.previous().span;
            let value = self.parse_expression()?;
            match expr.kind {
                ExprKind::Variable(_) | ExprKind::Member { .. } => Ok(Expr {
                    span: SourceSpan::new(expr.span.start, value.span.end),
                    kind: ExprKind::Assign {
                        target: Box::new(expr),
                        value: Box::new(value),
                    },
                }),
                _ => Err(
                    Diagnostic::new(DiagnosticKind::Parser, "invalid assignment target")
                        .with_span(equals),
                ),
            }
        } else {
            Ok(expr)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_and()?;
        let base = self.depth;
        while self.matches(TokenKind::DoublePipe) {
            self.descend()?;
            let right = self.parse_and()?;
            expr = logical(LogicalOp::Or, expr, right);
        }
        self.depth = base;
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_equality()?;
        let base = self.depth;
        while self.matches(TokenKind::DoubleAmpersand) {
            self.descend()?;
            let right = self.parse_equality()?;
            expr = logical(LogicalOp::And, expr, right);
        }
        self.depth = base;
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_comparison()?;
        let base = self.depth;
        while let Some(op) = self.match_operator(&[
            (TokenKind::EqualEqual, BinaryOp::Equal),
            (TokenKind::BangEqual, BinaryOp::NotEqual),
            (TokenKind::EqualEqualEqual, BinaryOp::StrictEqual),
            (TokenKind::BangEqualEqual, BinaryOp::StrictNotEqual),
        ]) {
            self.descend()?;
            let right = self.parse_comparison()?;
            expr = binary(op, expr, right);
        }
        self.depth = base;
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_term()?;
        let base = self.depth;
        while let Some(op) = self.match_operator(&[
            (TokenKind::LessEqual, BinaryOp::LessEqual),
            (TokenKind::GreaterEqual, BinaryOp::GreaterEqual),
            (TokenKind::Less, BinaryOp::Less),
            (TokenKind::Greater, BinaryOp::Greater),
        ]) {
            self.descend()?;
            let right = self.parse_term()?;
            expr = binary(op, expr, right);
        }
        self.depth = base;
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_factor()?;
        let base = self.depth;
        while let Some(op) = self.match_operator(&[
            (TokenKind::Plus, BinaryOp::Add),
            (TokenKind::Minus, BinaryOp::Sub),
        ]) {
            self.descend()?;
            let right = self.parse_factor()?;
            expr = binary(op, expr, right);
        }
        self.depth = base;
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_unary()?;
        let base = self.depth;
        while let Some(op) = self.match_operator(&[
            (TokenKind::Star, BinaryOp::Mul),
            (TokenKind::Slash, BinaryOp::Div),
            (TokenKind::Percent, BinaryOp::Mod),
        ]) {
            self.descend()?;
            let right = self.parse_unary()?;
            expr = binary(op, expr, right);
        }
        self.depth = base;
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = if self.matches(TokenKind::Minus) {
            Some(UnaryOp::Negate)
        } else if self.matches(TokenKind::Bang) {
            Some(UnaryOp::Not)
        } else if self.matches_keyword(Keyword::TypeOf) {
            Some(UnaryOp::TypeOf)
        } else {
            None
        };
        match op {
            Some(op) => {
                let start = self.previous().span.start;
                self.descend()?;
                let operand = self.parse_unary()?;
                self.depth -= 1;
                Ok(Expr {
                    span: SourceSpan::new(start, operand.span.end),
                    kind: ExprKind::Unary {
                        op,
                        expr: Box::new(operand),
                    },
                })
            }
            None => self.parse_call(),
        }
    }

    fn parse_call(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        let base = self.depth;
        loop {
            if self.matches(TokenKind::LParen) {
                self.descend()?;
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let paren = self.consume(TokenKind::RParen, "expected `)` after arguments")?;
                expr = Expr {
                    span: SourceSpan::new(expr.span.start, paren.span.end),
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
            } else if self.matches(TokenKind::Dot) {
                self.descend()?;
                let name = self.consume_property_name("expected property name after `.`")?;
                expr = Expr {
                    span: SourceSpan::new(expr.span.start, name.span.end),
                    kind: ExprKind::Member {
                        target: Box::new(expr),
                        property: name.lexeme,
                    },
                };
            } else {
                break;
            }
        }
        self.depth = base;
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let literal = match self.peek_kind() {
            TokenKind::Keyword(Keyword::True) => Some(Literal::Bool(true)),
            TokenKind::Keyword(Keyword::False) => Some(Literal::Bool(false)),
            TokenKind::Keyword(Keyword::Null) => Some(Literal::Null),
            TokenKind::Keyword(Keyword::Undefined) => Some(Literal::Undefined),
            _ => None,
        };
        if let Some(literal) = literal {
            let token = self.advance();
            return Ok(Expr {
                span: token.span,
                kind: ExprKind::Literal(literal),
            });
        }

        match self.peek_kind() {
            TokenKind::Number => {
                let token = self.advance();
                let value = token.lexeme.parse::<f64>().map_err(|_| {
                    Diagnostic::new(
                        DiagnosticKind::Parser,
                        format!("malformed number `{}`", token.lexeme),
                    )
                    .with_span(token.span)
                })?;
                Ok(Expr {
                    span: token.span,
                    kind: ExprKind::Literal(Literal::Number(value)),
                })
            }
            TokenKind::String => {
                let token = self.advance();
                Ok(Expr {
                    span: token.span,
                    kind: ExprKind::Literal(Literal::String(token.lexeme.into())),
                })
            }
            TokenKind::Identifier => {
                let token = self.advance();
                Ok(Expr {
                    span: token.span,
                    kind: ExprKind::Variable(token.lexeme),
                })
            }
            TokenKind::Keyword(Keyword::This) => {
                let token = self.advance();
                Ok(Expr {
                    span: token.span,
                    kind: ExprKind::This,
                })
            }
            TokenKind::Keyword(Keyword::Function) => {
                let (function, span) = self.parse_function()?;
                Ok(Expr {
                    span,
                    kind: ExprKind::Function(function),
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RParen, "expected `)` after expression")?;
                Ok(inner)
            }
            TokenKind::LBrace => self.parse_object_literal(),
            _ => {
                let token = self.peek().clone();
                Err(self.error(&token, "expected expression"))
            }
        }
    }

    fn parse_object_literal(&mut self) -> Result<Expr, Diagnostic> {
        let open = self.advance();
        let mut entries = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let key = match self.peek_kind() {
                TokenKind::String | TokenKind::Number => self.advance(),
                _ => self.consume_property_name("expected property name")?,
            };
            self.consume(TokenKind::Colon, "expected `:` after property name")?;
            let value = self.parse_expression()?;
            entries.push((key.lexeme, value));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        let close = self.consume(TokenKind::RBrace, "expected `}` after object literal")?;
        Ok(Expr {
            span: SourceSpan::new(open.span.start, close.span.end),
            kind: ExprKind::ObjectLiteral(entries),
        })
    }

    fn descend(&mut self) -> Result<(), Diagnostic> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(
                Diagnostic::new(DiagnosticKind::Parser, "expression nested too deeply")
                    .with_span(self.peek().span),
            );
        }
        self.depth += 1;
        Ok(())
    }

    fn match_operator(&mut self, table: &[(TokenKind, BinaryOp)]) -> Option<BinaryOp> {
        let (_, op) = table.iter().find(|(kind, _)| self.check(*kind))?;
        self.advance();
        Some(*op)
    }

    fn consume_optional_semicolon(&mut self) {
        let _ = self.matches(TokenKind::Semicolon);
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        self.matches(TokenKind::Keyword(keyword))
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), message))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Identifier, message)
    }

    /// Property names may reuse keywords, as in `point.this` or `{ if: 1 }`.
    fn consume_property_name(&mut self, message: &str) -> Result<Token, Diagnostic> {
        match self.peek_kind() {
            TokenKind::Identifier | TokenKind::Keyword(_) => Ok(self.advance()),
            _ => Err(self.error(self.peek(), message)),
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    /// The lexer always ends the stream with `Eof`, so this never runs past it.
    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.current + offset)
            .map(|token| token.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn is_at_end(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        let message = if token.kind == TokenKind::Eof {
            format!("{message}, found end of input")
        } else {
            format!("{message}, found `{}`", token.lexeme)
        };
        Diagnostic::new(DiagnosticKind::Parser, message).with_span(token.span)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr {
        span: SourceSpan::new(left.span.start, right.span.end),
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    Expr {
        span: SourceSpan::new(left.span.start, right.span.end),
        kind: ExprKind::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}
