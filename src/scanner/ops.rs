//! Scanner-bound operators for the fluent builder.
//!
//! Each method wraps one [`TextScanner`] primitive into a node-level
//! operator. Value-producing primitives (`digit`, `any_ch`,
//! `num_decimal`) deposit the scanned result into the value slot so a
//! following `act_value` can consume it.

use std::rc::Rc;

use crate::fex::builder::FexBuilder;
use crate::fex::factory::FlowExpression;

use super::text_scanner::TextScanner;

/// A factory for scanner-driven expressions with the default skip
/// callback wired to whitespace skipping.
pub fn scanner_expression() -> FlowExpression<TextScanner> {
    FlowExpression::with_default_skip(TextScanner::skip_spaces)
}

pub trait ScanOps {
    /// Match a single character.
    fn ch(&mut self, c: char) -> &mut Self;

    /// Match any one character out of `valid`; the matched character is
    /// the operator's value.
    fn any_ch(&mut self, valid: &str) -> &mut Self;

    /// Match one decimal digit; the digit is the operator's value.
    fn digit(&mut self) -> &mut Self;

    /// Match an unsigned decimal number; the parsed `f64` is the
    /// operator's value.
    fn num_decimal(&mut self) -> &mut Self;

    /// Skip whitespace; always passes.
    fn sp(&mut self) -> &mut Self;

    /// Pass only at end of input.
    fn is_eos(&mut self) -> &mut Self;

    /// Match a literal string.
    fn lit(&mut self, s: &str) -> &mut Self;

    /// Bind a fail-action that logs `msg` into the scanner's error log.
    fn on_fail_msg(&mut self, msg: &str) -> &mut Self;
}

impl ScanOps for FexBuilder<TextScanner> {
    fn ch(&mut self, c: char) -> &mut Self {
        self.op(move |s: &mut TextScanner| s.take_ch(c))
    }

    fn any_ch(&mut self, valid: &str) -> &mut Self {
        let valid = valid.to_string();
        self.op_val(move |s: &mut TextScanner, slot| {
            let c = s.take_any(&valid);
            slot.set_opt(c.is_some(), c)
        })
    }

    fn digit(&mut self) -> &mut Self {
        self.op_val(|s: &mut TextScanner, slot| {
            let c = s.take_digit();
            slot.set_opt(c.is_some(), c)
        })
    }

    fn num_decimal(&mut self) -> &mut Self {
        self.op_val(|s: &mut TextScanner, slot| {
            let v = s.take_num_decimal();
            slot.set_opt(v.is_some(), v)
        })
    }

    fn sp(&mut self) -> &mut Self {
        self.valid_op(TextScanner::skip_spaces)
    }

    fn is_eos(&mut self) -> &mut Self {
        self.op(|s: &mut TextScanner| s.is_eos())
    }

    fn lit(&mut self, text: &str) -> &mut Self {
        let text = text.to_string();
        self.op(move |s: &mut TextScanner| s.take_lit(&text))
    }

    fn on_fail_msg(&mut self, msg: &str) -> &mut Self {
        let msg = Rc::new(msg.to_string());
        self.on_fail(move |s: &mut TextScanner| s.log_error(msg.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn ch_and_lit_drive_the_cursor() {
        let fex = scanner_expression();
        let axiom = fex.seq(|s| {
            s.ch('v').lit("1.2").is_eos();
        });
        assert!(axiom.run(&mut TextScanner::new("v1.2")));
        assert!(!axiom.run(&mut TextScanner::new("v1.3")));
    }

    #[test]
    fn digit_value_reaches_act_value() {
        let digits = Rc::new(RefCell::new(String::new()));
        let d = digits.clone();

        let fex = scanner_expression();
        let axiom = fex.seq(|s| {
            s.rep_1_n(|r| {
                r.digit().act_value::<char>(move |c| d.borrow_mut().push(c));
            });
        });
        assert!(axiom.run(&mut TextScanner::new("407")));
        assert_eq!(*digits.borrow(), "407");
    }

    #[test]
    fn global_skip_runs_before_each_operator() {
        let fex = scanner_expression();
        let axiom = fex.seq(|s| {
            s.global_skip().ch('a').ch('b').is_eos();
        });
        assert!(axiom.run(&mut TextScanner::new("  a   b ")));
    }

    #[test]
    fn skip_applies_to_a_single_operator() {
        let fex = scanner_expression();
        let axiom = fex.seq(|s| {
            s.ch('a').ch('b').skip().is_eos();
        });
        assert!(axiom.run(&mut TextScanner::new("a  b")));
        // Only 'b' carries the skip; leading whitespace is not consumed.
        assert!(!axiom.run(&mut TextScanner::new(" a b")));
    }

    #[test]
    fn on_fail_msg_logs_into_the_scanner() {
        let fex = scanner_expression();
        let axiom = fex.seq(|s| {
            s.ch('(').on_fail_msg("( expected");
        });
        let mut scanner = TextScanner::new("[");
        assert!(!axiom.run(&mut scanner));
        assert_eq!(scanner.first_error().unwrap().message, "( expected");
    }
}
