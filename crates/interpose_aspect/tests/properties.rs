//! Property tests for advice ordering and fault transparency.
//!
//! Aspects here register a random number of advice of each kind; the
//! properties check that every call observes them in the fixed
//! Before → Around (outermost first) → body → After order, and that the body's
//! outcome reaches the caller unchanged whatever advice is in between.

use std::sync::Arc;

use interpose_aspect::{Advice, AdviceSet, Aspect, AspectRegistry, Marker, RegistrationError};
use parking_lot::Mutex;
use proptest::prelude::*;

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
struct BodyError(String);

struct Service;

/// Registers `before` Before, `around` Around and `after` After advice.
struct Shape {
    before: usize,
    around: usize,
    after: usize,
    log: Log,
}

impl Aspect for Shape {
    fn advise(&self, advice: &mut AdviceSet<'_>) -> Result<(), RegistrationError> {
        for index in 0..self.before {
            let log = Arc::clone(&self.log);
            advice.add(Advice::before(format!("before{index}"), move |_| {
                log.lock().push(format!("before{index}"));
                Ok(())
            }))?;
        }
        for index in 0..self.around {
            let log = Arc::clone(&self.log);
            advice.add(Advice::around(
                format!("around{index}"),
                move |_, proceed, arguments| {
                    log.lock().push(format!("around{index} in"));
                    let outcome = proceed.invoke(arguments);
                    log.lock().push(format!("around{index} out"));
                    outcome
                },
            ))?;
        }
        for index in 0..self.after {
            let log = Arc::clone(&self.log);
            advice.add(Advice::after(format!("after{index}"), move |_| {
                log.lock().push(format!("after{index}"));
                Ok(())
            }))?;
        }
        Ok(())
    }
}

fn expected(before: usize, around: usize, after: usize) -> Vec<String> {
    let mut order: Vec<String> = (0..before).map(|i| format!("before{i}")).collect();
    order.extend((0..around).map(|i| format!("around{i} in")));
    order.push("body".to_string());
    order.extend((0..around).rev().map(|i| format!("around{i} out")));
    order.extend((0..after).map(|i| format!("after{i}")));
    order
}

fn registry(before: usize, around: usize, after: usize, log: &Log) -> AspectRegistry {
    let mut builder = AspectRegistry::builder();
    builder
        .add_aspect(Shape {
            before,
            around,
            after,
            log: Arc::clone(log),
        })
        .unwrap();
    builder.finish().unwrap()
}

proptest! {
    #[test]
    fn advice_runs_in_fixed_order(
        before in 0usize..5,
        around in 0usize..5,
        after in 0usize..5,
        fail in any::<bool>(),
    ) {
        let log = Log::default();
        let registry = registry(before, around, after, &log);
        let body_log = Arc::clone(&log);
        let advised = registry
            .weave(&Marker::method::<Service>("run").with::<Shape>(), move |(): ()| {
                body_log.lock().push("body".to_string());
                if fail {
                    Err(BodyError("failed".into()))
                } else {
                    Ok(())
                }
            })
            .unwrap();

        let outcome = advised.call(());
        prop_assert_eq!(outcome.is_err(), fail);
        prop_assert_eq!(log.lock().clone(), expected(before, around, after));
    }

    #[test]
    fn outcome_reaches_caller_unchanged(
        around in 0usize..4,
        value in any::<i64>(),
        message in ".*",
        fail in any::<bool>(),
    ) {
        let log = Log::default();
        let registry = registry(1, around, 1, &log);
        let raised = BodyError(message.clone());
        let advised = registry
            .weave(&Marker::method::<Service>("run").with::<Shape>(), move |(input,): (i64,)| {
                if fail {
                    Err(raised.clone())
                } else {
                    Ok(input)
                }
            })
            .unwrap();

        let outcome = advised.call((value,));
        if fail {
            prop_assert_eq!(outcome, Err(BodyError(message)));
        } else {
            prop_assert_eq!(outcome, Ok(value));
        }
    }
}
