//! Entities shared by the unit tests.
use std::sync::Arc;

use crate::binding::Binding;
use crate::blueprint::Blueprint;
use crate::config::Settings;
use crate::graph::Graph;
use crate::task::Task;
use crate::types::{Literal, LiteralMap, LiteralType, TypedInterface};

pub fn settings() -> Settings {
    Settings::new("project", "domain", "version")
}

fn output(value: Literal) -> LiteralMap {
    LiteralMap::from([("o".to_string(), value)])
}

/// `o = a + 2`
pub fn t1() -> Arc<Task> {
    Task::builder(
        settings().task_id("t1"),
        TypedInterface::new()
            .with_input("a", LiteralType::Integer)
            .with_output("o", LiteralType::Integer),
    )
    .executor(|inputs| match inputs.get("a") {
        Some(Literal::Integer(a)) => Ok(output(Literal::Integer(a + 2))),
        other => anyhow::bail!("unexpected input {other:?}"),
    })
    .build()
    .unwrap()
}

/// `o = b + str(a)`
pub fn t2() -> Arc<Task> {
    Task::builder(
        settings().task_id("t2"),
        TypedInterface::new()
            .with_input("a", LiteralType::Integer)
            .with_input("b", LiteralType::String)
            .with_output("o", LiteralType::String),
    )
    .executor(|inputs| match (inputs.get("a"), inputs.get("b")) {
        (Some(Literal::Integer(a)), Some(Literal::String(b))) => Ok(output(Literal::String(format!("{b}{a}")))),
        other => anyhow::bail!("unexpected inputs {other:?}"),
    })
    .build()
    .unwrap()
}

/// Two chained tasks: `x = t1(a).o`, `y = t2(x, b).o`.
pub fn sub_wf() -> Arc<Graph> {
    let mut bp = Blueprint::new(settings().workflow_id("sub_wf")).unwrap();
    bp.input("a", LiteralType::Integer).input("b", LiteralType::String);

    let n0 = bp.node(&t1()).bind("a", Binding::input("a")).add().unwrap();
    let n1 = bp
        .node(&t2())
        .bind("a", n0.output("o"))
        .bind("b", Binding::input("b"))
        .add()
        .unwrap();

    bp.output("x", LiteralType::Integer, n0.output("o")).unwrap();
    bp.output("y", LiteralType::String, n1.output("o")).unwrap();
    bp.finish()
}
