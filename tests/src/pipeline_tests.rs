//! End-to-end pipeline runs
//!
//! These spin up real runner threads and depend on wall-clock timing, so they
//! run one at a time.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use relaybench_pipeline::backoff::WaitStrategy;
use relaybench_pipeline::config::PipelineConfig;
use relaybench_pipeline::errors::PipelineError;
use relaybench_pipeline::message::Message;
use relaybench_pipeline::pipeline::Pipeline;
use relaybench_pipeline::ring::channel;
use relaybench_pipeline::routing::RoutingTable;
use relaybench_pipeline::runners::{ProcessorRunner, ProducerRunner, TypeSampler};
use relaybench_pipeline::shared::SharedState;
use relaybench_tests::{counters_ordered, init_test_logging, quick_config};
use rstest::rstest;
use serial_test::serial;

#[test]
#[serial]
fn slow_strategy_builds_backlog_and_drains_on_shutdown() {
    init_test_logging();
    // 200µs per delivery: the producer outruns the strategy immediately.
    let config = quick_config(1, 1, 1)
        .with_message_types(1)
        .with_strategy_work_ns(200_000);
    let usable = config.queue_capacity - 1;

    let outcome = Pipeline::build(config).unwrap().run(|_| {}).unwrap();

    assert_eq!(outcome.samples.len(), 10);
    let peak = outcome.samples.iter().map(|s| s.total_occupancy()).max().unwrap();
    assert!(peak > usable / 2, "peak occupancy {peak} never approached {usable}");
    assert!(outcome.samples.iter().all(|s| s.stage1_occupancy.len() == 1 && s.stage2_occupancy.len() == 1));
    assert!(outcome.samples.iter().all(|s| counters_ordered(&s.counters)));
    assert!(outcome.samples.iter().all(|s| s.total_occupancy() <= 2 * usable));

    assert!(outcome.counters.delivered > 0);
    assert!(counters_ordered(&outcome.counters));
    assert!(outcome.residual() > 0);
    assert!(outcome.is_balanced(), "unbalanced outcome: {:?}", outcome.counters);
    assert_eq!(outcome.final_stage1_occupancy, vec![0]);
    assert_eq!(outcome.final_stage2_occupancy, vec![0]);
}

#[test]
#[serial]
fn fan_out_run_stays_balanced() {
    init_test_logging();
    let config = quick_config(2, 3, 2)
        .with_stage1_rule(0, 2)
        .with_stage1_rule(1, 1)
        .with_stage2_rule(3, 1)
        .with_wait(WaitStrategy::SpinThenYield { spins: 64 });

    let outcome = Pipeline::build(config).unwrap().run(|_| {}).unwrap();

    assert!(outcome.counters.produced > 0);
    assert!(outcome.latency.samples > 0);
    assert_eq!(outcome.latency.samples as u64, outcome.counters.delivered);
    assert!(outcome.latency.total.p50 <= outcome.latency.total.p99);
    assert!(outcome.samples.iter().all(|s| counters_ordered(&s.counters)));
    assert!(outcome.is_balanced(), "unbalanced outcome: {:?}", outcome.counters);
    assert!(outcome.final_stage1_occupancy.iter().chain(&outcome.final_stage2_occupancy).all(|&n| n == 0));
}

#[test]
#[serial]
fn messages_from_one_producer_stay_in_order() {
    const WANTED: usize = 50_000;
    let config = PipelineConfig::new(2, 1, 1);
    let routing = Arc::new(RoutingTable::build(&config).unwrap());
    let shared = Arc::new(SharedState::new());
    let sampler = TypeSampler::new(config.message_types, &[]).unwrap();

    let (p0_tx, p0_rx) = channel::<Message>(64);
    let (p1_tx, p1_rx) = channel::<Message>(64);
    let (out_tx, mut out_rx) = channel::<Message>(64);

    let producers: Vec<_> = [(0u32, p0_tx), (1u32, p1_tx)]
        .into_iter()
        .map(|(origin, tx)| {
            let runner = ProducerRunner::new(
                origin,
                vec![tx],
                Arc::clone(&routing),
                Arc::clone(&shared),
                sampler.clone(),
                origin as u64 + 1,
                WaitStrategy::Yield,
            );
            thread::spawn(move || runner.run())
        })
        .collect();

    let processor = ProcessorRunner {
        id: 0,
        inbound: vec![p0_rx, p1_rx],
        outbound: vec![out_tx],
        routing: Arc::clone(&routing),
        shared: Arc::clone(&shared),
        work_ns: 0,
        wait: WaitStrategy::Yield,
    };
    let processor = thread::spawn(move || processor.run());

    let mut next_sequence: HashMap<u32, u64> = HashMap::new();
    let mut received = 0;
    while received < WANTED {
        match out_rx.try_pop() {
            Some(msg) => {
                let expected = next_sequence.entry(msg.origin_id).or_insert(0);
                assert_eq!(msg.sequence, *expected, "origin {} out of order", msg.origin_id);
                *expected += 1;
                assert_eq!(msg.routed_by, 0);
                assert!(msg.processed_at >= msg.created_at);
                received += 1;
            }
            None => thread::yield_now(),
        }
    }

    shared.stop.trigger();
    for producer in producers {
        producer.join().unwrap();
    }
    processor.join().unwrap();

    assert_eq!(next_sequence.len(), 2, "both producers should have been drained");
}

#[rstest]
#[case::processor_out_of_range(PipelineConfig::new(1, 2, 1).with_stage1_rule(0, 5))]
#[case::strategy_out_of_range(PipelineConfig::new(1, 1, 2).with_stage2_rule(1, 2))]
#[case::type_out_of_range(PipelineConfig::new(1, 1, 1).with_stage1_rule(9, 0))]
fn bad_routes_fail_before_any_thread(#[case] config: PipelineConfig) {
    let err = Pipeline::build(config).err().expect("build should fail");
    assert!(matches!(
        err,
        PipelineError::RouteOutOfRange { .. } | PipelineError::MessageTypeOutOfRange { .. }
    ));
}

#[rstest]
#[case(PipelineConfig::new(0, 1, 1))]
#[case(PipelineConfig::new(1, 0, 1))]
#[case(PipelineConfig::new(1, 1, 0))]
fn empty_stage_is_rejected(#[case] config: PipelineConfig) {
    assert!(matches!(Pipeline::build(config), Err(PipelineError::InvalidConfig(_))));
}
