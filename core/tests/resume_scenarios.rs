use resumable_core::ast::{BinaryOperator, LabelTarget, Node, NodeRef, Ty, Variable};
use resumable_core::error::RuntimeErrorKind;
use resumable_core::{lower_async_body, DriverOptions, LoweringOptions, StateMachine, StdHost, Step, Value};

fn trace(s: &str) -> NodeRef {
    Node::call("trace", vec![Node::str(s)])
}

fn yield_now() -> NodeRef {
    Node::await_on(Node::call("yield", vec![]), Ty::Unit)
}

fn error(msg: &str) -> NodeRef {
    Node::call("error", vec![Node::str(msg)])
}

/// Lower and drive `body`; returns the result, the trace and the callback count.
fn drive(body: &NodeRef) -> (Value, Vec<String>, usize) {
    let lowered = lower_async_body(body, &LoweringOptions::default()).expect("lowering failed");
    let mut machine = StateMachine::new(&lowered);
    let mut host = StdHost::new();
    let value = machine
        .run_to_completion(&mut host, &DriverOptions::default())
        .unwrap_or_else(|e| panic!("run failed: {}\n{}", e, lowered.body));
    (value, host.take_trace(), machine.callbacks())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn completed_producer_returns_without_callback() {
    let body = Node::ret(Node::await_on(Node::call("ready", vec![Node::int(42)]), Ty::Int));
    let (value, _, callbacks) = drive(&body);
    assert_eq!(value, Value::Int(42));
    assert_eq!(callbacks, 0);
}

#[test]
fn loop_of_pending_producers_sums_with_one_callback_each() {
    let i = Variable::new("i", Ty::Int);
    let sum = Variable::new("sum", Ty::Int);
    let done = LabelTarget::new("done");
    let body = Node::block(
        vec![i.clone(), sum.clone()],
        vec![
            Node::assign(&i, Node::int(0)),
            Node::assign(&sum, Node::int(0)),
            Node::loop_with(
                Node::seq(vec![
                    Node::if_then(Node::binary(BinaryOperator::Ge, Node::var(&i), Node::int(10)), Node::goto(&done)),
                    Node::assign(
                        &sum,
                        Node::binary(
                            BinaryOperator::Add,
                            Node::var(&sum),
                            Node::await_on(Node::call("pending", vec![Node::var(&i)]), Ty::Int),
                        ),
                    ),
                    Node::assign(&i, Node::binary(BinaryOperator::Add, Node::var(&i), Node::int(1))),
                ]),
                Some(done),
                None,
            ),
            Node::ret(Node::var(&sum)),
        ],
    );
    let (value, _, callbacks) = drive(&body);
    assert_eq!(value, Value::Int(45));
    assert_eq!(callbacks, 10);
}

#[test]
fn suspend_in_finally_after_throw_reraises_after_completion() {
    let e = Variable::new("e", Ty::Any);
    let body = Node::seq(vec![
        Node::try_catch(
            Node::try_finally(
                Node::seq(vec![trace("T"), Node::throw(error("boom"))]),
                Node::seq(vec![trace("FB"), yield_now(), trace("FE")]),
            ),
            vec![Node::catch(Some(e.clone()), Node::seq(vec![trace("C"), Node::var(&e)]))],
        ),
    ]);
    let lowered = lower_async_body(&body, &LoweringOptions::default()).expect("lowering failed");
    let mut machine = StateMachine::new(&lowered);
    let mut host = StdHost::new();

    let awaiter = match machine.move_next(&mut host).expect("first step failed") {
        Step::Suspended(Value::Future(awaiter)) => awaiter,
        other => panic!("expected a suspension, got {:?}", other),
    };
    assert_eq!(host.trace(), &strings(&["T", "FB"]));
    assert!(machine.state() >= 0);

    awaiter.borrow_mut().advance();
    let second = machine.move_next(&mut host).expect("second step failed");
    assert_eq!(second, Step::Completed(Value::Error("boom".to_string())));
    assert_eq!(host.trace(), &strings(&["T", "FB", "FE", "C"]));
    assert_eq!(machine.callbacks(), 1);
}

#[test]
fn custom_acquire_operation_yields_producer_value() {
    let body = Node::ret(Node::await_with(Node::call("pending", vec![Node::int(7)]), "awaiter_of", Ty::Int));
    let (value, _, callbacks) = drive(&body);
    assert_eq!(value, Value::Int(7));
    assert_eq!(callbacks, 1);
}

#[test]
fn spilled_operands_survive_suspension() {
    let body = Node::ret(Node::binary(
        BinaryOperator::Add,
        Node::await_on(Node::call("pending", vec![Node::int(1)]), Ty::Int),
        Node::await_on(Node::call("pending", vec![Node::int(2)]), Ty::Int),
    ));
    let (value, _, callbacks) = drive(&body);
    assert_eq!(value, Value::Int(3));
    assert_eq!(callbacks, 2);
}

#[test]
fn unspilled_operands_cannot_be_resumed() {
    let body = Node::ret(Node::binary(
        BinaryOperator::Add,
        Node::call("trace", vec![Node::str("left")]),
        Node::await_on(Node::call("pending", vec![Node::int(2)]), Ty::Int),
    ));
    let options = LoweringOptions { spill_operands: false, ..LoweringOptions::default() };
    let lowered = lower_async_body(&body, &options).expect("lowering failed");
    let mut machine = StateMachine::new(&lowered);
    let err = machine
        .run_to_completion(&mut StdHost::new(), &DriverOptions::default())
        .expect_err("resumed into a half-evaluated expression");
    assert_eq!(err.kind(), &RuntimeErrorKind::InvalidJump);
}

#[test]
fn resume_in_try_reaches_its_catch() {
    let e = Variable::new("e", Ty::Any);
    let body = Node::seq(vec![
        Node::try_catch(
            Node::seq(vec![yield_now(), Node::binary(BinaryOperator::Div, Node::int(1), Node::int(0))]),
            vec![Node::catch(Some(e), Node::ret(Node::int(-1)))],
        ),
        Node::ret(Node::int(0)),
    ]);
    let (value, _, callbacks) = drive(&body);
    assert_eq!(value, Value::Int(-1));
    assert_eq!(callbacks, 1);
}

#[test]
fn resume_in_try_runs_finally_once() {
    let body = Node::seq(vec![
        Node::try_finally(Node::seq(vec![yield_now(), trace("body"), yield_now()]), trace("dispose")),
        Node::ret(Node::int(5)),
    ]);
    let (value, trace, callbacks) = drive(&body);
    assert_eq!(value, Value::Int(5));
    assert_eq!(trace, strings(&["body", "dispose"]));
    assert_eq!(callbacks, 2);
}

#[test]
fn resume_in_nested_try_dispatches_through_both_regions() {
    let body = Node::seq(vec![
        Node::try_finally(
            Node::seq(vec![
                trace("outer"),
                Node::try_finally(Node::seq(vec![yield_now(), trace("inner")]), trace("inner-finally")),
                yield_now(),
            ]),
            trace("outer-finally"),
        ),
        Node::ret(Node::int(1)),
    ]);
    let (value, trace, callbacks) = drive(&body);
    assert_eq!(value, Value::Int(1));
    assert_eq!(trace, strings(&["outer", "inner", "inner-finally", "outer-finally"]));
    assert_eq!(callbacks, 2);
}

#[test]
fn await_in_finally_runs_in_order() {
    let body = Node::seq(vec![
        Node::try_finally(trace("T"), Node::seq(vec![trace("FB"), yield_now(), trace("FE")])),
        trace("C"),
    ]);
    let (_, trace, callbacks) = drive(&body);
    assert_eq!(trace, strings(&["T", "FB", "FE", "C"]));
    assert_eq!(callbacks, 1);
}

#[test]
fn await_in_finally_keeps_try_value() {
    let body = Node::ret(Node::try_finally(
        Node::int(10),
        Node::seq(vec![yield_now(), trace("F")]),
    ));
    let (value, trace, _) = drive(&body);
    assert_eq!(value, Value::Int(10));
    assert_eq!(trace, strings(&["F"]));
}

#[test]
fn await_in_fault_runs_only_on_exception() {
    let quiet = Node::seq(vec![
        Node::try_fault(trace("T"), Node::seq(vec![trace("FB"), yield_now(), trace("FE")])),
        trace("C"),
    ]);
    let (_, trace, callbacks) = drive(&quiet);
    assert_eq!(trace, strings(&["T", "C"]));
    assert_eq!(callbacks, 0);

    let e = Variable::new("e", Ty::Any);
    let failing = Node::seq(vec![Node::try_catch(
        Node::try_fault(
            Node::seq(vec![crate::trace("T"), Node::throw(error("bad"))]),
            Node::seq(vec![crate::trace("FB"), yield_now(), crate::trace("FE")]),
        ),
        vec![Node::catch(Some(e), crate::trace("C"))],
    )]);
    let (_, trace, callbacks) = drive(&failing);
    assert_eq!(trace, strings(&["T", "FB", "FE", "C"]));
    assert_eq!(callbacks, 1);
}

#[test]
fn nested_finally_with_suspensions_unwinds_inside_out() {
    let body = Node::try_finally(
        trace("T1"),
        Node::seq(vec![
            trace("FB1"),
            Node::try_finally(trace("T2"), Node::seq(vec![trace("FB2"), yield_now(), trace("FE2")])),
            yield_now(),
            trace("FE1"),
        ]),
    );
    let (_, trace, callbacks) = drive(&body);
    assert_eq!(trace, strings(&["T1", "FB1", "T2", "FB2", "FE2", "FE1"]));
    assert_eq!(callbacks, 2);
}

#[test]
fn goto_out_of_try_waits_for_suspending_finally() {
    let out = LabelTarget::new("out");
    let body = Node::seq(vec![
        Node::try_finally(
            Node::seq(vec![trace("T"), Node::goto(&out), trace("unreachable")]),
            Node::seq(vec![trace("FB"), yield_now(), trace("FE")]),
        ),
        trace("skipped"),
        Node::label(&out),
        trace("O"),
    ]);
    let (_, trace, _) = drive(&body);
    assert_eq!(trace, strings(&["T", "FB", "FE", "O"]));
}

#[test]
fn return_out_of_try_waits_for_suspending_finally() {
    let body = Node::seq(vec![
        Node::try_finally(Node::ret(Node::int(42)), Node::seq(vec![yield_now(), trace("F")])),
        Node::ret(Node::int(0)),
    ]);
    let (value, trace, _) = drive(&body);
    assert_eq!(value, Value::Int(42));
    assert_eq!(trace, strings(&["F"]));
}

#[test]
fn await_in_catch_sees_the_caught_exception() {
    let e = Variable::new("e", Ty::Any);
    let body = Node::ret(Node::try_catch(
        Node::seq(vec![trace("T"), Node::throw(error("caught")), Node::int(0)]),
        vec![Node::catch(
            Some(e.clone()),
            Node::seq(vec![yield_now(), trace("C"), Node::var(&e)]),
        )],
    ));
    let (value, trace, callbacks) = drive(&body);
    assert_eq!(value, Value::Error("caught".to_string()));
    assert_eq!(trace, strings(&["T", "C"]));
    assert_eq!(callbacks, 1);
}

#[test]
fn rethrow_from_suspending_catch_reaches_outer_handler() {
    let inner = Variable::new("inner", Ty::Any);
    let outer = Variable::new("outer", Ty::Any);
    let body = Node::ret(Node::try_catch(
        Node::try_catch(
            Node::throw(error("again")),
            vec![Node::catch(Some(inner), Node::seq(vec![yield_now(), trace("inner"), Node::rethrow()]))],
        ),
        vec![Node::catch(Some(outer.clone()), Node::seq(vec![trace("outer"), Node::var(&outer)]))],
    ));
    let (value, trace, _) = drive(&body);
    assert_eq!(value, Value::Error("again".to_string()));
    assert_eq!(trace, strings(&["inner", "outer"]));
}

#[test]
fn failed_producer_raises_at_resume_point() {
    let e = Variable::new("e", Ty::Any);
    let body = Node::ret(Node::try_catch(
        Node::seq(vec![
            Node::await_on(Node::call("fail", vec![Node::str("late"), Node::int(1)]), Ty::Int),
            Node::str("unreachable"),
        ]),
        vec![Node::catch(Some(e.clone()), Node::var(&e))],
    ));
    let (value, _, callbacks) = drive(&body);
    assert_eq!(value, Value::Error("late".to_string()));
    assert_eq!(callbacks, 1);
}

#[test]
fn unhandled_exception_is_a_runtime_error() {
    let body = Node::seq(vec![yield_now(), Node::throw(error("loose"))]);
    let lowered = lower_async_body(&body, &LoweringOptions::default()).expect("lowering failed");
    let err = StateMachine::new(&lowered)
        .run_to_completion(&mut StdHost::new(), &DriverOptions::default())
        .expect_err("exception escaped silently");
    assert_eq!(err.kind(), &RuntimeErrorKind::Unhandled);
}

#[test]
fn resumption_limit_stops_runaway_bodies() {
    let body = Node::loop_with(Node::seq(vec![yield_now()]), None, None);
    let lowered = lower_async_body(&body, &LoweringOptions::default()).expect("lowering failed");
    let mut machine = StateMachine::new(&lowered);
    let err = machine
        .run_to_completion(&mut StdHost::new(), &DriverOptions { max_resumptions: 5 })
        .expect_err("infinite loop completed");
    assert_eq!(err.kind(), &RuntimeErrorKind::ResumeLimit);
    assert_eq!(machine.resumptions(), 5);
}

#[test]
fn parameters_are_read_from_persisted_storage() {
    let n = Variable::new("n", Ty::Int);
    let body = Node::ret(Node::binary(
        BinaryOperator::Mul,
        Node::var(&n),
        Node::await_on(Node::call("pending", vec![Node::int(3)]), Ty::Int),
    ));
    let lowered = lower_async_body(&body, &LoweringOptions::default()).expect("lowering failed");
    let mut machine = StateMachine::new(&lowered).with_argument(&n, Value::Int(14));
    let value = machine.run_to_completion(&mut StdHost::new(), &DriverOptions::default()).expect("run failed");
    assert_eq!(value, Value::Int(42));
}
