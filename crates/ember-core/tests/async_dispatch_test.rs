// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use ember_core::event::catalog::{MouseMoved, MouseScrolled};
use ember_core::event::{Bindings, EventDispatcher, EventListener};
use ember_core::DispatchConfig;
use std::collections::HashMap;
use std::thread;

/// Collects motion samples; `delta_x` carries the producer index and `x` the
/// sequence number within that producer.
#[derive(Default)]
struct MotionSink {
    samples: Vec<(u32, u32)>,
    scrolled: f32,
}

impl MotionSink {
    fn on_motion(&mut self, event: &mut MouseMoved) {
        self.samples.push((event.delta_x as u32, event.x as u32));
    }

    fn on_scroll(&mut self, event: &mut MouseScrolled) {
        self.scrolled += event.delta_y;
    }
}

impl EventListener for MotionSink {
    fn bind(bindings: &mut Bindings<Self>) {
        bindings.on(Self::on_motion).on(Self::on_scroll);
    }
}

#[test]
fn test_flush_delivers_each_event_once_in_fifo_order() {
    let dispatcher = EventDispatcher::new();
    let sink = dispatcher.listen(MotionSink::default());

    for i in 0..10 {
        dispatcher.notify_async(MouseMoved::new(i as f32, 0.0, 0.0, 0.0));
    }
    assert!(sink.lock().samples.is_empty());

    assert_eq!(dispatcher.flush_async_events(), 10);
    assert_eq!(dispatcher.flush_async_events(), 0);

    let seen: Vec<u32> = sink.lock().samples.iter().map(|(_, n)| *n).collect();
    assert_eq!(seen, (0..10).collect::<Vec<_>>());
}

#[test]
fn test_concurrent_producers_keep_per_thread_order() {
    const PRODUCERS: u32 = 4;
    const PER_PRODUCER: u32 = 500;

    let config = DispatchConfig {
        flush_batch_size: 32,
        ..DispatchConfig::default()
    };
    let dispatcher = EventDispatcher::with_config(config);
    let sink = dispatcher.listen(MotionSink::default());

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let dispatcher = dispatcher.clone();
            thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    let event = MouseMoved::new(seq as f32, 0.0, producer as f32, 0.0);
                    dispatcher.notify_async(event);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Producer thread panicked");
    }

    assert_eq!(
        dispatcher.flush_async_events(),
        (PRODUCERS * PER_PRODUCER) as usize
    );

    let sink = sink.lock();
    assert_eq!(sink.samples.len(), (PRODUCERS * PER_PRODUCER) as usize);
    let mut per_producer: HashMap<u32, Vec<u32>> = HashMap::new();
    for (producer, seq) in &sink.samples {
        per_producer.entry(*producer).or_default().push(*seq);
    }
    for seqs in per_producer.values() {
        assert_eq!(*seqs, (0..PER_PRODUCER).collect::<Vec<_>>());
    }
}

#[test]
fn test_flush_on_one_thread_while_producers_run() {
    let dispatcher = EventDispatcher::new();
    let sink = dispatcher.listen(MotionSink::default());

    let producer = {
        let dispatcher = dispatcher.clone();
        thread::spawn(move || {
            for _ in 0..1000 {
                dispatcher.notify_async(MouseScrolled {
                    delta_x: 0.0,
                    delta_y: 1.0,
                });
            }
        })
    };

    let mut delivered = 0;
    while !producer.is_finished() {
        delivered += dispatcher.flush_async_events();
    }
    producer.join().expect("Producer thread panicked");
    delivered += dispatcher.flush_async_events();

    assert_eq!(delivered, 1000);
    assert_eq!(sink.lock().scrolled, 1000.0);
}

#[test]
fn test_global_facade_round_trip() {
    let sink = ember_core::Listener::new(MotionSink::default());
    ember_core::notify_async(MouseScrolled {
        delta_x: 0.0,
        delta_y: 2.5,
    });
    ember_core::flush_async_events();
    assert_eq!(sink.lock().scrolled, 2.5);
}
