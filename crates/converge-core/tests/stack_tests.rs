use converge_core::{
    CheckRequest, ConvergeError, Repository, Resource, Scheduler, SchedulerError, Stack, StackContext, Storage,
    TemplateKey,
};
use converge_test_utils::{dispatched, memory_context, template};
use mockall::mock;
use pretty_assertions::assert_eq;
use std::sync::Arc;

mock! {
    pub Checks {}

    impl Scheduler for Checks {
        fn check_resource(&self, request: CheckRequest) -> Result<(), SchedulerError>;
    }
}

#[test]
fn test_create_then_complete() {
    let t = memory_context();
    let mut stack = Stack::new(t.ctx.clone(), "web", template(&[("a", &[]), ("b", &["a"])]));

    let pass = stack.create().unwrap();
    assert_eq!(dispatched(&pass), vec!["a/build"]);
    assert_eq!(stack.previous_template_key(), None);

    assert!(stack.mark_complete(pass.target).unwrap());
    assert_eq!(stack.current_template_key(), Some(TemplateKey(1)));
    assert_eq!(stack.previous_template_key(), Some(TemplateKey(1)));

    let reloaded = Stack::load(t.ctx.clone(), stack.key().unwrap()).unwrap();
    assert_eq!(reloaded.previous_template_key(), Some(TemplateKey(1)));
    assert_eq!(reloaded.template().resources().len(), 2);
}

#[test]
fn test_mark_complete_is_idempotent() {
    let t = memory_context();
    let mut stack = Stack::new(t.ctx.clone(), "web", template(&[("a", &[])]));
    stack.create().unwrap();
    stack.mark_complete(Some(TemplateKey(1))).unwrap();
    stack.update(template(&[("a", &[]), ("b", &[])])).unwrap();

    assert!(stack.mark_complete(Some(TemplateKey(2))).unwrap());
    assert!(!stack.mark_complete(Some(TemplateKey(2))).unwrap());

    assert_eq!(stack.previous_template_key(), Some(TemplateKey(2)));
    assert_eq!(t.store.templates().len(), 1);
}

#[test]
fn test_stale_completion_changes_nothing() {
    let t = memory_context();
    let mut stack = Stack::new(t.ctx.clone(), "web", template(&[("a", &[])]));
    stack.create().unwrap();
    stack.mark_complete(Some(TemplateKey(1))).unwrap();
    stack.update(template(&[("b", &[])])).unwrap();
    stack.update(template(&[("c", &[])])).unwrap();

    // Completion of the superseded update arrives late
    assert!(!stack.mark_complete(Some(TemplateKey(2))).unwrap());

    assert_eq!(stack.current_template_key(), Some(TemplateKey(3)));
    assert_eq!(stack.previous_template_key(), Some(TemplateKey(2)));
    assert_eq!(t.store.templates().len(), 3);
}

#[test]
fn test_at_most_two_generations_retained() {
    let t = memory_context();
    let mut stack = Stack::new(t.ctx.clone(), "web", template(&[("a", &[])]));
    stack.create().unwrap();
    stack.mark_complete(stack.current_template_key()).unwrap();

    for round in 0..6 {
        let name = format!("r{round}");
        stack.update(template(&[("a", &[]), (name.as_str(), &["a"])])).unwrap();
        assert!(t.store.templates().len() <= 2);

        stack.mark_complete(stack.current_template_key()).unwrap();
        assert_eq!(t.store.templates().len(), 1);
    }
}

#[test]
fn test_rollback_targets_previous_generation() {
    let t = memory_context();
    let mut stack = Stack::new(t.ctx.clone(), "web", template(&[("a", &[])]));
    stack.create().unwrap();
    stack.mark_complete(Some(TemplateKey(1))).unwrap();
    stack.update(template(&[("a", &[]), ("b", &["a"])])).unwrap();

    let pass = stack.rollback().unwrap().expect("rollback pass");

    assert_eq!(pass.target, Some(TemplateKey(1)));
    assert_eq!(pass.from, Some(TemplateKey(2)));
    assert_eq!(stack.current_template_key(), Some(TemplateKey(1)));
    assert_eq!(stack.previous_template_key(), Some(TemplateKey(1)));
    assert_eq!(dispatched(&pass), vec!["a/build", "b/cleanup"]);

    // A second rollback has nothing left to undo
    assert!(stack.rollback().unwrap().is_none());
}

#[test]
fn test_rollback_without_previous_is_noop() {
    let t = memory_context();
    let mut stack = Stack::new(t.ctx.clone(), "web", template(&[("a", &[])]));
    stack.create().unwrap();
    stack.mark_complete(Some(TemplateKey(1))).unwrap();
    t.scheduler.take();

    assert!(stack.rollback().unwrap().is_none());
    assert!(t.scheduler.is_empty());
}

#[test]
fn test_delete_completion_collects_last_generation() {
    let t = memory_context();
    let mut stack = Stack::new(t.ctx.clone(), "web", template(&[("a", &[]), ("b", &["a"])]));
    stack.create().unwrap();
    stack.mark_complete(Some(TemplateKey(1))).unwrap();

    let pass = stack.delete().unwrap();
    assert_eq!(pass.target, None);
    assert_eq!(dispatched(&pass), vec!["b/cleanup"]);

    assert!(stack.mark_complete(None).unwrap());
    assert_eq!(stack.previous_template_key(), None);
    assert!(t.store.templates().is_empty());
}

#[test]
fn test_load_by_name() {
    let t = memory_context();
    let mut stack = Stack::new(t.ctx.clone(), "web", template(&[("a", &[])]));
    stack.create().unwrap();

    let loaded = Stack::load_by_name(t.ctx.clone(), "web").unwrap();
    assert_eq!(loaded.key(), stack.key());

    let missing = Stack::load_by_name(t.ctx.clone(), "db").unwrap_err();
    assert!(missing.is_not_found());
}

#[test]
fn test_load_by_name_rejects_ambiguity() {
    let t = memory_context();
    for _ in 0..2 {
        Stack::new(t.ctx.clone(), "web", template(&[("a", &[])])).create().unwrap();
    }

    let err = Stack::load_by_name(t.ctx.clone(), "web").unwrap_err();

    assert!(matches!(err, ConvergeError::AmbiguousStack { ref name, count: 2 } if name == "web"));
    assert!(err.requires_operator());
}

#[test]
fn test_load_missing_stack() {
    let t = memory_context();

    let err = Stack::load(t.ctx.clone(), converge_core::StackKey(42)).unwrap_err();

    assert!(err.is_not_found());
}

#[test]
fn test_template_cycle_dispatches_nothing() {
    let t = memory_context();
    let mut checks = MockChecks::new();
    checks.expect_check_resource().never();
    let ctx = StackContext::new(t.store.clone(), Arc::new(checks));

    let mut stack = Stack::new(ctx, "web", template(&[("a", &["b"]), ("b", &["a"])]));
    let err = stack.create().unwrap_err();

    match err {
        ConvergeError::Cycle(cycle) => {
            assert!(cycle.involves("a"));
            assert!(cycle.involves("b"));
        }
        other => panic!("expected cycle, got {other}"),
    }
}

#[test]
fn test_cycle_in_merged_graph_dispatches_nothing() {
    let t = memory_context();
    let mut stack = Stack::new(t.ctx.clone(), "web", template(&[("a", &["b"]), ("b", &[])]));
    stack.create().unwrap();
    stack.mark_complete(Some(TemplateKey(1))).unwrap();

    // b claims to replace a while a still requires b
    let stack_key = stack.key().unwrap();
    let mut rows = Resource::load_all_for_stack(t.store.as_ref(), stack_key).unwrap();
    let b = rows.iter_mut().find(|r| r.name == "b").unwrap();
    b.replaces = Some("a".to_string());
    b.store(t.store.as_ref()).unwrap();

    let mut checks = MockChecks::new();
    checks.expect_check_resource().never();
    let ctx = StackContext::new(t.store.clone(), Arc::new(checks));
    let mut stack = Stack::load(ctx, stack_key).unwrap();

    let err = stack.delete().unwrap_err();
    assert!(matches!(err, ConvergeError::Cycle(_)));
}

#[test]
fn test_scheduler_failure_surfaces() {
    let t = memory_context();
    let mut checks = MockChecks::new();
    checks
        .expect_check_resource()
        .times(1)
        .returning(|_| Err(SchedulerError::Closed));
    let ctx = StackContext::new(t.store.clone(), Arc::new(checks));

    let err = Stack::new(ctx, "web", template(&[("a", &[])])).create().unwrap_err();

    assert!(err.is_retryable());
}

#[test]
fn test_leaves_carry_pass_identity() {
    let t = memory_context();
    let mut stack = Stack::new(t.ctx.clone(), "web", template(&[("a", &[]), ("b", &[])]));

    let pass = stack.create().unwrap();
    let requests = t.scheduler.take();

    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.stack_key, pass.stack_key);
        assert_eq!(request.generation, Some(TemplateKey(1)));
        assert!(request.forward);
        assert!(request.payload.is_empty());
        assert!(Arc::ptr_eq(&request.graph, &pass.graph));
    }
}
