//! Lifecycle ordering, the `$construct` reducer, and hook failures.

use corekit_check::{Config, Instruction, ValidationError, Value};
use corekit_loader::{
    ClassDefinition, ClassLoader, ConstructOutcome, ConstructUnit, CoreError, Hook,
    LifecycleState, ModuleTable,
};
use parking_lot::Mutex;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

fn record(log: &Log, entry: impl Into<String>) {
    log.lock().push(entry.into());
}

/// Declare every instance phase hook on `name`, logging each call.
fn logged(
    builder: corekit_loader::ClassBuilder,
    name: &'static str,
    log: &Log,
) -> corekit_loader::ClassBuilder {
    Hook::PHASES.into_iter().fold(builder, |builder, hook| {
        let log = log.clone();
        builder.hook(hook, move |_| {
            record(&log, format!("{hook} {name}"));
            Ok(())
        })
    })
}

fn construct_setting(log: &Log, name: &'static str, x: i64) -> ConstructUnit {
    let log = log.clone();
    ConstructUnit::new(["x"], move |_, args| {
        let seen = args.get("x")?.cloned();
        record(&log, format!("$construct {name} saw {seen:?}"));
        Ok(ConstructOutcome::Override(Config::new().with("x", x)))
    })
    .providing(["x"])
}

fn loader_with(table: ModuleTable) -> Arc<ClassLoader> {
    let loader = ClassLoader::new();
    loader.register_namespace("App", table).expect("namespace");
    loader
}

#[test]
fn construct_runs_base_then_mixins_and_later_overrides_win() {
    let log: Log = Arc::default();
    let loader = loader_with(
        ModuleTable::new()
            .with(
                "B",
                ClassDefinition::class("App.B")
                    .construct(construct_setting(&log, "B", 1))
                    .build()
                    .expect("B"),
            )
            .with(
                "M",
                ClassDefinition::mixin("App.M")
                    .construct(construct_setting(&log, "M", 2))
                    .build()
                    .expect("M"),
            ),
    );

    let instance = loader
        .instantiate_mix("App.B", &["App.M"], Config::new())
        .expect("instantiate");
    assert_eq!(instance.get("x"), Some(Value::from(2)));
    assert_eq!(
        *log.lock(),
        vec!["$construct B saw None", "$construct M saw Some(1)"]
    );
}

#[test]
fn phases_run_in_order_across_the_chain() {
    let log: Log = Arc::default();
    let loader = loader_with(
        ModuleTable::new()
            .with(
                "B",
                logged(ClassDefinition::class("App.B"), "B", &log)
                    .build()
                    .expect("B"),
            )
            .with(
                "M",
                logged(ClassDefinition::mixin("App.M"), "M", &log)
                    .build()
                    .expect("M"),
            )
            .with(
                "C",
                logged(
                    ClassDefinition::class("App.C")
                        .extends("App.B")
                        .with_mixin("App.M"),
                    "C",
                    &log,
                )
                .build()
                .expect("C"),
            ),
    );

    let instance = loader.instantiate("App.C", Config::new()).expect("instantiate");
    assert_eq!(instance.state(), LifecycleState::Initialized);
    insta::assert_debug_snapshot!(*log.lock(), @r#"
    [
        "$beforeConstruct B",
        "$beforeConstruct M",
        "$beforeConstruct C",
        "$afterConstruct B",
        "$afterConstruct M",
        "$afterConstruct C",
        "$beforeReady B",
        "$beforeReady M",
        "$beforeReady C",
        "$ready B",
        "$ready M",
        "$ready C",
        "$afterReady B",
        "$afterReady M",
        "$afterReady C",
    ]
    "#);
}

#[test]
fn halt_skips_later_construct_units_only() {
    let log: Log = Arc::default();
    let unit = |name: &'static str, outcome: ConstructOutcome| {
        let log = log.clone();
        ConstructUnit::new(Vec::<String>::new(), move |_, _| {
            record(&log, format!("$construct {name}"));
            Ok::<_, CoreError>(outcome.clone())
        })
    };
    let after = |name: &'static str| {
        let log = log.clone();
        move |_: &corekit_loader::Instance| {
            record(&log, format!("$afterConstruct {name}"));
            Ok::<_, CoreError>(())
        }
    };

    let loader = loader_with(
        ModuleTable::new()
            .with(
                "B",
                ClassDefinition::class("App.B")
                    .construct(unit("B", ConstructOutcome::Override(Config::new().with("kept", true))))
                    .hook(Hook::AfterConstruct, after("B"))
                    .build()
                    .expect("B"),
            )
            .with(
                "Stop",
                ClassDefinition::mixin("App.Stop")
                    .construct(unit("Stop", ConstructOutcome::Halt))
                    .hook(Hook::AfterConstruct, after("Stop"))
                    .build()
                    .expect("Stop"),
            )
            .with(
                "Late",
                ClassDefinition::mixin("App.Late")
                    .construct(unit("Late", ConstructOutcome::Continue))
                    .hook(Hook::AfterConstruct, after("Late"))
                    .build()
                    .expect("Late"),
            ),
    );

    let instance = loader
        .instantiate_mix("App.B", &["App.Stop", "App.Late"], Config::new())
        .expect("instantiate");
    assert_eq!(instance.get("kept"), Some(Value::from(true)));
    assert_eq!(
        *log.lock(),
        vec![
            "$construct B",
            "$construct Stop",
            "$afterConstruct B",
            "$afterConstruct Stop",
            "$afterConstruct Late",
        ]
    );
}

#[test]
fn hook_failures_abort_and_name_the_hook() {
    let loader = loader_with(ModuleTable::new().with(
        "Strict",
        ClassDefinition::class("App.Strict")
            .construct(ConstructUnit::new(["path"], |_, args| {
                args.require("path", &Instruction::check("isString"))?;
                Ok(ConstructOutcome::Continue)
            }))
            .build()
            .expect("Strict"),
    ));

    let err = loader
        .instantiate("App.Strict", Config::new().with("path", Value::Json(serde_json::json!([1, 2, 3]))))
        .expect_err("invalid path");
    insta::assert_snapshot!(
        err.to_string(),
        @"$construct of `App.Strict` failed: invalid dependency `path`: expected isString, got: Array (length=3)"
    );
    assert!(matches!(
        err.root_cause(),
        CoreError::Validation(ValidationError::Dependency { .. })
    ));
}

#[test]
fn missing_dependencies_describe_as_undefined() {
    let loader = loader_with(ModuleTable::new().with(
        "Needy",
        ClassDefinition::class("App.Needy")
            .construct(ConstructUnit::new(["fs"], |_, args| {
                args.require("fs", &Instruction::check("isInstance"))?;
                Ok(ConstructOutcome::Continue)
            }))
            .build()
            .expect("Needy"),
    ));
    let err = loader
        .instantiate("App.Needy", Config::new())
        .expect_err("missing fs");
    assert!(err.to_string().ends_with("got: undefined"), "{err}");
}

#[test]
fn requiring_a_value_a_later_unit_provides_is_a_precedence_error() {
    let loader = loader_with(
        ModuleTable::new()
            .with(
                "B",
                ClassDefinition::class("App.B")
                    .construct(ConstructUnit::new(["root"], |_, args| {
                        args.require("root", &Instruction::check("isString"))?;
                        Ok(ConstructOutcome::Continue)
                    }))
                    .build()
                    .expect("B"),
            )
            .with(
                "Paths",
                ClassDefinition::mixin("App.Paths")
                    .construct(
                        ConstructUnit::new(Vec::<String>::new(), |_, _| {
                            Ok(ConstructOutcome::Override(Config::new().with("root", "/srv")))
                        })
                        .providing(["root"]),
                    )
                    .build()
                    .expect("Paths"),
            ),
    );

    let class = loader.compose("App.B", &["App.Paths"]).expect("compose");
    assert_eq!(class.precedence_report().len(), 1);

    let err = loader
        .instantiate_class(class, Config::new())
        .expect_err("precedence");
    assert!(matches!(
        err.root_cause(),
        CoreError::DependencyPrecedence { dependency, required_by, provided_by }
            if dependency == "root" && required_by == "App.B" && provided_by == "App.Paths"
    ));

    // An explicit value satisfies the requirement up front.
    let instance = loader
        .instantiate_mix("App.B", &["App.Paths"], Config::new().with("root", "/etc"))
        .expect("explicit root");
    assert_eq!(instance.get("root"), Some(Value::from("/srv")));
}

#[test]
fn undeclared_dependencies_cannot_be_read() {
    let loader = loader_with(ModuleTable::new().with(
        "Sneaky",
        ClassDefinition::class("App.Sneaky")
            .construct(ConstructUnit::new(["a"], |_, args| {
                args.get("b")?;
                Ok(ConstructOutcome::Continue)
            }))
            .build()
            .expect("Sneaky"),
    ));
    let err = loader
        .instantiate("App.Sneaky", Config::new())
        .expect_err("undeclared");
    assert!(matches!(
        err.root_cause(),
        CoreError::UndeclaredDependency { dependency, .. } if dependency == "b"
    ));
}
