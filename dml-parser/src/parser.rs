use crate::ast::{Arg, BOp, Expr, ExprKind, Program, Statement, StatementKind, UOp};
use crate::lexer::{tokenize, SpannedToken, Token};
use dml_core::error::DmlError;

/// Recursive descent parser over tokens.
///
/// ```text
/// program   := statement*
/// statement := IDENT ('=' | '<-') expr ';'? | expr ';'?
/// expr      := term (('+'|'-') term)*
/// term      := unary (('*'|'/'|'%*%') unary)*
/// unary     := ('-'|'+') unary | power
/// power     := primary ('^' unary)?
/// primary   := NUMBER | STRING | TRUE | FALSE | IDENT | call | '(' expr ')'
/// call      := IDENT '(' [arg (',' arg)*] ')'
/// arg       := [IDENT '='] expr
/// ```
struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|t| t.token.clone());
        self.pos += 1;
        t
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    #[track_caller]
    fn unexpected(&self, expected: &str) -> DmlError {
        match self.peek() {
            Some(t) => DmlError::parse_error(format!(
                "Expected {expected} at line {}, found `{t}`",
                self.line()
            )),
            None => DmlError::parse_error(format!(
                "Expected {expected} at line {}, found end of script",
                self.line()
            )),
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), DmlError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{token}`")))
        }
    }

    fn program(&mut self) -> Result<Program, DmlError> {
        let mut statements = Vec::new();
        while self.peek().is_some() {
            if self.eat(&Token::Semi) {
                continue;
            }
            statements.push(self.statement()?);
        }
        Ok(Program { statements })
    }

    fn statement(&mut self) -> Result<Statement, DmlError> {
        let line = self.line();
        let kind = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Ident(target)), Some(Token::Assign | Token::LeftArrow)) => {
                let target = target.clone();
                self.pos += 2;
                StatementKind::Assign { target, value: self.expr()? }
            }
            _ => StatementKind::Expr(self.expr()?),
        };
        self.eat(&Token::Semi);
        Ok(Statement { kind, line })
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, DmlError>,
        ops: fn(&Token) -> Option<BOp>,
    ) -> Result<Expr, DmlError> {
        let mut x = next(self)?;
        while let Some(op) = self.peek().and_then(ops) {
            let line = self.line();
            self.pos += 1;
            let y = next(self)?;
            x = Expr { kind: ExprKind::Binary(op, Box::new(x), Box::new(y)), line };
        }
        Ok(x)
    }

    fn expr(&mut self) -> Result<Expr, DmlError> {
        self.binary_level(Self::term, |t| match t {
            Token::Plus => Some(BOp::Add),
            Token::Minus => Some(BOp::Sub),
            _ => None,
        })
    }

    fn term(&mut self) -> Result<Expr, DmlError> {
        self.binary_level(Self::unary, |t| match t {
            Token::Star => Some(BOp::Mul),
            Token::Slash => Some(BOp::Div),
            Token::MatMul => Some(BOp::MatMul),
            _ => None,
        })
    }

    fn unary(&mut self) -> Result<Expr, DmlError> {
        let line = self.line();
        if self.eat(&Token::Minus) {
            let x = self.unary()?;
            return Ok(match x.kind {
                // Fold negative literals, so that -3 is a literal
                ExprKind::Int(v) => Expr { kind: ExprKind::Int(-v), line },
                ExprKind::Double(v) => Expr { kind: ExprKind::Double(-v), line },
                _ => Expr { kind: ExprKind::Unary(UOp::Neg, Box::new(x)), line },
            });
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, DmlError> {
        let x = self.primary()?;
        if self.peek() == Some(&Token::Caret) {
            let line = self.line();
            self.pos += 1;
            let y = self.unary()?;
            return Ok(Expr { kind: ExprKind::Binary(BOp::Pow, Box::new(x), Box::new(y)), line });
        }
        Ok(x)
    }

    fn primary(&mut self) -> Result<Expr, DmlError> {
        let line = self.line();
        let kind = match self.advance() {
            Some(Token::Double(x)) => ExprKind::Double(x),
            Some(Token::Int(x)) => ExprKind::Int(x),
            Some(Token::True) => ExprKind::Boolean(true),
            Some(Token::False) => ExprKind::Boolean(false),
            Some(Token::String(x)) => ExprKind::String(x),
            Some(Token::Ident(name)) => {
                if self.eat(&Token::LParen) {
                    ExprKind::Call { name, args: self.args()? }
                } else {
                    ExprKind::Ident(name)
                }
            }
            Some(Token::LParen) => {
                let x = self.expr()?;
                self.expect(&Token::RParen)?;
                return Ok(x);
            }
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("expression"));
            }
        };
        Ok(Expr { kind, line })
    }

    fn args(&mut self) -> Result<Vec<Arg>, DmlError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            let name = match (self.peek(), self.peek_at(1)) {
                (Some(Token::Ident(name)), Some(Token::Assign)) => {
                    let name = name.clone();
                    self.pos += 2;
                    Some(name)
                }
                _ => None,
            };
            args.push(Arg { name, value: self.expr()? });
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }
}

/// Parse dml source into program
pub fn parse(source: &str) -> Result<Program, DmlError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let program = parser.program()?;
    if dml_core::debug(dml_core::DEBUG_PARSE) {
        println!("Parsed program:\n{program}");
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_expr(source: &str) -> Result<Expr, DmlError> {
        let mut program = parse(source)?;
        match program.statements.pop().map(|s| s.kind) {
            Some(StatementKind::Expr(e)) => Ok(e),
            _ => Err(DmlError::runtime_error("expected expression statement")),
        }
    }

    #[test]
    fn precedence() -> Result<(), DmlError> {
        assert_eq!(single_expr("1 + 2 * 3")?.to_string(), "(1 + (2 * 3))");
        assert_eq!(single_expr("(1 + 2) * 3")?.to_string(), "((1 + 2) * 3)");
        assert_eq!(single_expr("-x ^ 2")?.to_string(), "-((x ^ 2))");
        assert_eq!(single_expr("2 ^ 3 ^ 2")?.to_string(), "(2 ^ (3 ^ 2))");
        assert_eq!(single_expr("a - b - c")?.to_string(), "((a - b) - c)");
        assert_eq!(single_expr("-3")?.kind, ExprKind::Int(-3));
        Ok(())
    }

    #[test]
    fn calls_with_named_args() -> Result<(), DmlError> {
        let e = single_expr("read(\"in/x\", rows=10, cols=1, format=\"text\")")?;
        let ExprKind::Call { name, args } = e.kind else {
            panic!("expected call");
        };
        assert_eq!(&*name, "read");
        assert_eq!(args.len(), 4);
        assert_eq!(args[0].name, None);
        assert_eq!(args[1].name.as_deref(), Some("rows"));
        assert_eq!(args[1].value.kind, ExprKind::Int(10));
        assert_eq!(single_expr("f()")?.to_string(), "f()");
        Ok(())
    }

    #[test]
    fn statements_and_lines() -> Result<(), DmlError> {
        let program = parse("x = 1;\ny <- x + 1\n\nprint(y);;")?;
        assert_eq!(program.statements.len(), 3);
        assert_eq!(program.statements[1].line, 2);
        assert_eq!(program.statements[2].line, 4);
        assert!(matches!(
            &program.statements[1].kind,
            StatementKind::Assign { target, .. } if &**target == "y"
        ));
        Ok(())
    }

    #[test]
    fn syntax_errors() {
        for source in ["x = ", "sum(x", "x = (1 + 2", "= 3", "f(a b)"] {
            let err = parse(source).err();
            assert!(matches!(err, Some(DmlError::ParseError(_))), "{source}");
        }
    }
}
