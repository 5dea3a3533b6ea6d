//! Engine-level behavior against plain (non-scanner) contexts: commit
//! discipline, alternative selection, pre-operator pacing, value
//! transport, lookahead quiescence and forward references.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use fex::{FlowExpression, Tracer};

/// A cursor over a fixed character tape; operators consume one expected
/// character and decline without consuming otherwise.
struct Tape {
    chars: Vec<char>,
    pos: usize,
}

impl Tape {
    fn new(s: &str) -> Self {
        Tape {
            chars: s.chars().collect(),
            pos: 0,
        }
    }

    fn take(&mut self, c: char) -> bool {
        if self.chars.get(self.pos) == Some(&c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn take_any(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn peek_is(&self, c: char) -> bool {
        self.chars.get(self.pos) == Some(&c)
    }
}

// ============================================================================
// SEQUENCES AND OPTIONALS
// ============================================================================

#[test]
fn sequence_of_operators_requires_every_operator() {
    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.seq(|s| {
        s.op(|t: &mut Tape| t.take('a'))
            .op(|t: &mut Tape| t.take('b'))
            .op(|t: &mut Tape| t.take('c'));
    });

    assert!(axiom.run(&mut Tape::new("abc")));
    assert!(!axiom.run(&mut Tape::new("abx")));
    assert!(!axiom.run(&mut Tape::new("x")));
}

#[test]
fn optional_declining_on_its_first_step_still_passes() {
    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.seq(|s| {
        s.opt(|o| {
            o.op(|t: &mut Tape| t.take('+')).op(|t: &mut Tape| t.take('x'));
        })
        .op(|t: &mut Tape| t.take('1'));
    });

    assert!(axiom.run(&mut Tape::new("1")));
    assert!(axiom.run(&mut Tape::new("+x1")));
    // Committed to the optional, then broke: hard failure.
    assert!(!axiom.run(&mut Tape::new("+1")));
}

// ============================================================================
// ALTERNATIVE SELECTION
// ============================================================================

#[test]
fn one_of_takes_the_first_viable_arm_and_stops_probing() {
    let probes = Rc::new(RefCell::new(Vec::new()));

    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.one_of(|b| {
        for (label, want) in [("a-arm", 'a'), ("b-arm", 'b'), ("c-arm", 'c')] {
            let probes = probes.clone();
            b.op(move |t: &mut Tape| {
                probes.borrow_mut().push(label);
                t.take(want)
            });
        }
    });

    assert!(axiom.run(&mut Tape::new("b")));
    assert_eq!(*probes.borrow(), vec!["a-arm", "b-arm"]);
}

#[test]
fn one_of_does_not_fall_through_after_an_arm_commits() {
    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.one_of(|b| {
        b.seq(|s| {
            s.op(|t: &mut Tape| t.take('a')).op(|t: &mut Tape| t.take('1'));
        });
        // Would match "a2", but must never be consulted once the first
        // arm has committed on 'a'.
        b.seq(|s| {
            s.op(|t: &mut Tape| t.take('a')).op(|t: &mut Tape| t.take('2'));
        });
    });

    assert!(!axiom.run(&mut Tape::new("a2")));
}

#[test]
fn break_on_stops_a_repetition_at_the_sentinel() {
    let eaten = Rc::new(RefCell::new(String::new()));
    let e = eaten.clone();

    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.seq(|b| {
        b.rep_0_n(|r| {
            r.seq(|s| {
                // The sentinel probe peeks; consumption happens after
                // the loop.
                s.break_on(|n| {
                    n.op(|t: &mut Tape| t.peek_is('q'));
                })
                .op(move |t: &mut Tape| match t.take_any() {
                    Some(c) => {
                        e.borrow_mut().push(c);
                        true
                    }
                    None => false,
                });
            });
        })
        .op(|t: &mut Tape| t.take('q'));
    });

    assert!(axiom.run(&mut Tape::new("abcq")));
    assert_eq!(*eaten.borrow(), "abc");
}

#[test]
fn opt_one_of_is_skippable() {
    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.seq(|b| {
        b.opt_one_of(|alt| {
            alt.op(|t: &mut Tape| t.take('+'));
            alt.op(|t: &mut Tape| t.take('-'));
        })
        .op(|t: &mut Tape| t.take('5'));
    });

    assert!(axiom.run(&mut Tape::new("5")));
    assert!(axiom.run(&mut Tape::new("-5")));
    assert!(!axiom.run(&mut Tape::new("x5")));
}

#[test]
fn rep_one_of_consumes_mixed_tokens() {
    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.seq(|b| {
        b.rep_one_of(1, -1, |alt| {
            alt.op(|t: &mut Tape| t.take('a'));
            alt.op(|t: &mut Tape| t.take('b'));
        })
        .op(|t: &mut Tape| t.take('.'));
    });

    assert!(axiom.run(&mut Tape::new("abba.")));
    assert!(!axiom.run(&mut Tape::new(".")));
}

#[test]
fn repeat_as_an_arm_declines_or_commits_on_its_first_pass() {
    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.one_of(|b| {
        b.rep(2, 3, |r| {
            r.op(|t: &mut Tape| t.take('x'));
        });
        b.op(|t: &mut Tape| t.take('y'));
    });

    // A first-pass decline lets the next arm have a go.
    assert!(axiom.run(&mut Tape::new("y")));
    assert!(axiom.run(&mut Tape::new("xx")));
    // One repetition committed the arm; missing the minimum is final.
    assert!(!axiom.run(&mut Tape::new("x")));
}

#[test]
fn fex_splices_prebuilt_expressions() {
    let fex: FlowExpression<Tape> = FlowExpression::new();
    let greeting = fex.seq(|b| {
        b.op(|t: &mut Tape| t.take('h')).op(|t: &mut Tape| t.take('i'));
    });
    let axiom = fex.seq(|b| {
        b.fex(&[&greeting]).op(|t: &mut Tape| t.take('!'));
    });

    assert!(axiom.run(&mut Tape::new("hi!")));
    assert!(!axiom.run(&mut Tape::new("ho!")));
}

#[test]
fn default_act_serves_as_the_fallback_arm() {
    let fallback = Rc::new(RefCell::new(0));
    let f = fallback.clone();

    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.one_of(|b| {
        b.op(|t: &mut Tape| t.take('x'));
        b.default_act(move |_t| *f.borrow_mut() += 1);
    });

    assert!(axiom.run(&mut Tape::new("y")));
    assert_eq!(*fallback.borrow(), 1);
}

#[test]
fn fail_arm_reports_and_fails_the_one_of() {
    let reports = Rc::new(RefCell::new(0));
    let r = reports.clone();

    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.one_of(|b| {
        b.op(|t: &mut Tape| t.take('x'));
        b.fail(move |_t| *r.borrow_mut() += 1);
    });

    assert!(!axiom.run(&mut Tape::new("y")));
    assert_eq!(*reports.borrow(), 1);
}

// ============================================================================
// PRE-OPERATORS
// ============================================================================

#[test]
fn pre_op_runs_once_per_committing_operator() {
    let skips = Rc::new(RefCell::new(0));
    let s = skips.clone();

    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.seq(|b| {
        b.global_pre_op(move |_t| *s.borrow_mut() += 1)
            .one_of(|alts| {
                alts.op(|t: &mut Tape| t.take('x'));
                alts.op(|t: &mut Tape| t.take('y'));
            })
            .op(|t: &mut Tape| t.take('z'));
    });

    // The 'x' probe disarms the pre-op, the 'y' probe reuses it, the
    // 'y' success re-arms it for 'z': two runs, one per commit.
    assert!(axiom.run(&mut Tape::new("yz")));
    assert_eq!(*skips.borrow(), 2);
}

#[test]
fn per_operator_pre_op_overrides_the_shared_one() {
    let shared = Rc::new(RefCell::new(0));
    let own = Rc::new(RefCell::new(0));
    let sh = shared.clone();
    let ow = own.clone();

    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.seq(|b| {
        b.global_pre_op(move |_t| *sh.borrow_mut() += 1)
            .op(|t: &mut Tape| t.take('a'))
            .op(|t: &mut Tape| t.take('b'))
            .pre_op(move |_t| *ow.borrow_mut() += 1);
    });

    assert!(axiom.run(&mut Tape::new("ab")));
    assert_eq!(*shared.borrow(), 1);
    assert_eq!(*own.borrow(), 1);
}

// ============================================================================
// VALUE TRANSPORT
// ============================================================================

#[test]
fn a_failed_operator_never_delivers_its_value() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();

    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.seq(|b| {
        b.op_val(|_t, slot| {
            // The slot is filled, but the predicate declines.
            slot.set(true, 'v');
            false
        })
        .act_value::<char>(move |c| s.borrow_mut().push(c));
    });

    assert!(!axiom.run(&mut Tape::new("")));
    assert!(seen.borrow().is_empty());
}

#[test]
fn an_empty_slot_suppresses_the_value_action() {
    let calls = Rc::new(RefCell::new(0));
    let c = calls.clone();

    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.seq(|b| {
        b.op_val(|_t, slot| slot.set_opt(true, None::<char>))
            .act_value::<char>(move |_| *c.borrow_mut() += 1);
    });

    assert!(axiom.run(&mut Tape::new("")));
    assert_eq!(*calls.borrow(), 0);
}

// ============================================================================
// FAIL-ACTION DISCIPLINE
// ============================================================================

#[test]
fn lookahead_keeps_fail_actions_quiet() {
    let noise = Rc::new(RefCell::new(0));
    let n = noise.clone();

    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.one_of(|b| {
        b.seq(|s| {
            s.op(|t: &mut Tape| t.take('x'))
                .on_fail(move |_t| *n.borrow_mut() += 1);
        });
        b.op(|t: &mut Tape| t.take('y'));
    });

    // The first arm is rejected during lookahead; its fail-action must
    // stay silent.
    assert!(axiom.run(&mut Tape::new("y")));
    assert_eq!(*noise.borrow(), 0);
}

#[test]
fn committed_failures_do_fire_fail_actions() {
    let fired = Rc::new(RefCell::new(0));
    let f = fired.clone();

    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.seq(|b| {
        b.op(|t: &mut Tape| t.take('a'))
            .op(|t: &mut Tape| t.take('b'))
            .on_fail(move |_t| *f.borrow_mut() += 1);
    });

    assert!(!axiom.run(&mut Tape::new("ax")));
    assert_eq!(*fired.borrow(), 1);
}

// ============================================================================
// REFERENCES
// ============================================================================

#[test]
fn forward_reference_resolves_across_expressions() {
    let fex: FlowExpression<Tape> = FlowExpression::new();

    // The reference is linked before the production is recorded, and the
    // name is cited with different casing.
    let axiom = fex.seq(|b| {
        b.ref_to("GREETING").op(|t: &mut Tape| t.take('!'));
    });
    let _greeting = fex.seq(|b| {
        b.ref_name("Greeting")
            .op(|t: &mut Tape| t.take('h'))
            .op(|t: &mut Tape| t.take('i'));
    });

    assert!(axiom.run(&mut Tape::new("hi!")));
    assert!(!axiom.run(&mut Tape::new("ho!")));
}

#[test]
fn recording_a_name_twice_rebinds_it() {
    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.seq(|b| {
        b.ref_to("item");
    });
    let _first = fex.seq(|b| {
        b.ref_name("item").op(|t: &mut Tape| t.take('1'));
    });
    let _second = fex.seq(|b| {
        b.ref_name("item").op(|t: &mut Tape| t.take('2'));
    });

    assert!(!axiom.run(&mut Tape::new("1")));
    assert!(axiom.run(&mut Tape::new("2")));
}

#[test]
fn opt_self_recurses_while_input_lasts() {
    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.seq(|b| {
        b.op(|t: &mut Tape| t.take('a')).opt_self();
    });

    let mut tape = Tape::new("aaab");
    assert!(axiom.run(&mut tape));
    assert_eq!(tape.pos, 3);
}

// ============================================================================
// ACTIONS
// ============================================================================

#[test]
fn rep_act_runs_the_callback_with_indices() {
    let indices = Rc::new(RefCell::new(Vec::new()));
    let i = indices.clone();

    let fex: FlowExpression<Tape> = FlowExpression::new();
    let axiom = fex.seq(|b| {
        b.rep_act(3, move |_t, idx| i.borrow_mut().push(idx));
    });

    assert!(axiom.run(&mut Tape::new("")));
    assert_eq!(*indices.borrow(), vec![0, 1, 2]);
}

// ============================================================================
// TRACING
// ============================================================================

#[derive(Default)]
struct RecordingTracer {
    messages: RefCell<Vec<String>>,
}

impl Tracer for RecordingTracer {
    fn message(&self, level: i32, msg: &str) {
        self.messages.borrow_mut().push(format!("{}:{}", level, msg));
    }
}

#[test]
fn trace_bindings_report_through_the_installed_tracer() {
    let tracer = Rc::new(RecordingTracer::default());

    let fex: FlowExpression<Tape> = FlowExpression::new();
    fex.set_tracer(tracer.clone());

    let axiom = fex.seq(|b| {
        b.trace(|_t| "enter".to_string(), 1)
            .op(|t: &mut Tape| t.take('a'))
            .trace_op(|_t| "take a".to_string(), 2);
    });

    assert!(axiom.run(&mut Tape::new("a")));
    let messages = tracer.messages.borrow();
    assert_eq!(messages[0], "1:enter");
    assert_eq!(messages[1], "2:take a [pass]");
}

#[test]
fn trace_op_with_value_sees_the_slot_before_delivery() {
    let tracer = Rc::new(RecordingTracer::default());

    let fex: FlowExpression<Tape> = FlowExpression::new();
    fex.set_tracer(tracer.clone());

    let axiom = fex.seq(|b| {
        b.op_val(|_t, slot| slot.set(true, 7_i32))
            .trace_op_with_value(
                |_t, slot| format!("slot={}", slot.get::<i32>().copied().unwrap_or(-1)),
                3,
            );
    });

    assert!(axiom.run(&mut Tape::new("")));
    assert_eq!(tracer.messages.borrow()[0], "3:slot=7 [pass]");
}

#[test]
fn trace_off_drops_future_bindings() {
    let tracer = Rc::new(RecordingTracer::default());

    let fex: FlowExpression<Tape> = FlowExpression::new();
    fex.set_tracer(tracer.clone());
    fex.trace_on(false);

    let axiom = fex.seq(|b| {
        b.trace(|_t| "quiet".to_string(), 1)
            .op(|t: &mut Tape| t.take('a'));
    });

    assert!(axiom.run(&mut Tape::new("a")));
    assert!(tracer.messages.borrow().is_empty());
}

// ============================================================================
// A FLOW CHART WITHOUT A SCANNER
// ============================================================================

/// Scripted console: a menu loop reads lines until one comes back empty.
struct Console {
    lines: VecDeque<&'static str>,
    current: String,
    menus_shown: usize,
    dispatched: Vec<String>,
}

impl Console {
    fn new(lines: &[&'static str]) -> Self {
        Console {
            lines: lines.iter().copied().collect(),
            current: String::new(),
            menus_shown: 0,
            dispatched: Vec::new(),
        }
    }

    fn read_line(&mut self) -> bool {
        self.current = self.lines.pop_front().unwrap_or("").to_string();
        !self.current.is_empty()
    }
}

#[test]
fn menu_loop_dispatches_each_line_and_redraws_per_iteration() {
    let fex: FlowExpression<Console> = FlowExpression::new();
    let axiom = fex.rep_0_n(|r| {
        r.act(|c: &mut Console| c.menus_shown += 1)
            .op(Console::read_line)
            .act(|c: &mut Console| {
                let line = c.current.clone();
                c.dispatched.push(line);
            });
    });

    let mut console = Console::new(&["list", "add 3", "quit"]);
    assert!(axiom.run(&mut console));

    assert_eq!(console.dispatched, vec!["list", "add 3", "quit"]);
    // The final iteration printed the menu, read the empty line and
    // declined: one extra redraw.
    assert_eq!(console.menus_shown, 4);
}
