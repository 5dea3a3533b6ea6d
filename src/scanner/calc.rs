//! Arithmetic sample grammar over the text scanner.
//!
//! The classic precedence chain, shared by the demo binary and the
//! test suite:
//!
//! ```text
//! expr    := factor (('+' | '-') factor)*
//! factor  := unary (('*' | '/') unary)*
//! unary   := '-' unary | primary
//! primary := NUMBER | '(' expr ')'
//! ```
//!
//! Values travel through a number stack mutated by the grammar's
//! actions; whitespace is handled by the shared pre-operator.

use std::cell::RefCell;
use std::rc::Rc;

use crate::fex::{FexNode, FlowExpression};
use crate::scanner::ops::{scanner_expression, ScanOps};
use crate::scanner::text_scanner::TextScanner;

/// An evaluator built from the arithmetic grammar. The factory stays
/// inside so the named productions outlive every run.
pub struct Calculator {
    _fex: FlowExpression<TextScanner>,
    axiom: FexNode<TextScanner>,
    stack: Rc<RefCell<Vec<f64>>>,
}

impl Calculator {
    pub fn new() -> Self {
        let stack = Rc::new(RefCell::new(Vec::new()));
        let fex = scanner_expression();
        let axiom = build_grammar(&fex, &stack);
        Calculator {
            _fex: fex,
            axiom,
            stack,
        }
    }

    /// Drive the grammar over `scanner`. Diagnostics land in the
    /// scanner's error log.
    pub fn parse(&self, scanner: &mut TextScanner) -> bool {
        self.stack.borrow_mut().clear();
        self.axiom.run(scanner)
    }

    /// The evaluated result, once a parse has passed.
    pub fn value(&self) -> Option<f64> {
        self.stack.borrow().last().copied()
    }
}

impl Default for Calculator {
    fn default() -> Self {
        Calculator::new()
    }
}

/// Pop two operands, push `f(a, b)`.
fn apply2(
    stack: &Rc<RefCell<Vec<f64>>>,
    f: impl Fn(f64, f64) -> f64 + 'static,
) -> impl Fn(&mut TextScanner) + 'static {
    let stack = stack.clone();
    move |_s| {
        let mut values = stack.borrow_mut();
        let b = values.pop().unwrap_or(0.0);
        let a = values.pop().unwrap_or(0.0);
        values.push(f(a, b));
    }
}

fn build_grammar(
    fex: &FlowExpression<TextScanner>,
    stack: &Rc<RefCell<Vec<f64>>>,
) -> FexNode<TextScanner> {
    let add = apply2(stack, |a, b| a + b);
    let sub = apply2(stack, |a, b| a - b);
    let mul = apply2(stack, |a, b| a * b);
    let div = apply2(stack, |a, b| a / b);
    let guard = stack.clone();
    let neg = {
        let stack = stack.clone();
        move |_s: &mut TextScanner| {
            let mut values = stack.borrow_mut();
            let x = values.pop().unwrap_or(0.0);
            values.push(-x);
        }
    };
    let push = {
        let stack = stack.clone();
        move |v: f64| stack.borrow_mut().push(v)
    };

    let _expr = fex.seq(|b| {
        b.ref_name("expr")
            .global_skip()
            .ref_to("factor")
            .rep_0_n(|r| {
                r.one_of(|alt| {
                    alt.seq(|s| {
                        s.ch('+').ref_to("factor").act(add);
                    });
                    alt.seq(|s| {
                        s.ch('-').ref_to("factor").act(sub);
                    });
                });
            });
    });

    let _factor = fex.seq(|b| {
        b.ref_name("factor").ref_to("unary").rep_0_n(|r| {
            r.one_of(|alt| {
                alt.seq(|s| {
                    s.ch('*').ref_to("unary").act(mul);
                });
                alt.seq(|s| {
                    s.ch('/')
                        .ref_to("unary")
                        .assert(move |_s| guard.borrow().last().copied().unwrap_or(1.0) != 0.0)
                        .on_fail_msg("Division by 0")
                        .act(div);
                });
            });
        });
    });

    let _unary = fex.seq(|b| {
        b.ref_name("unary")
            .one_of(|alt| {
                alt.seq(|s| {
                    s.ch('-').ref_to("unary").act(neg);
                });
                alt.ref_to("primary");
            })
            .on_fail_msg("Primary expected");
    });

    let _primary = fex.one_of(|b| {
        b.ref_name("primary");
        b.num_decimal().act_value::<f64>(push);
        b.seq(|s| {
            s.ch('(').ref_to("expr").ch(')').on_fail_msg(") expected");
        });
    });

    fex.seq(|b| {
        b.ref_to("expr")
            .is_eos()
            .on_fail_msg("Unexpected trailing input");
    })
}
