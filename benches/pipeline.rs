use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rex::{DiscardSink, Value, Vm, compile_document};

/// Build a JSON document with `n` rules, each reading one fact and writing one.
fn document(n: usize) -> String {
    let rules: Vec<String> = (0..n)
        .map(|i| {
            format!(
                r#"{{
                    "name": "rule_{i}",
                    "priority": {priority},
                    "conditions": {{"all": [
                        {{"fact": "sensor_{i}", "operator": "greaterThan", "value": {i}}},
                        {{"any": [
                            {{"fact": "mode", "operator": "equal", "value": "auto"}},
                            {{"fact": "override", "operator": "equal", "value": true}}
                        ]}}
                    ]}},
                    "event": {{"eventType": "bench", "actions": [
                        {{"type": "updateFact", "target": "out_{i}", "value": true}}
                    ]}}
                }}"#,
                priority = i % 7
            )
        })
        .collect();
    format!("[{}]", rules.join(","))
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for n in [1, 16, 64] {
        let json = document(n);
        group.bench_function(format!("{n}_rules"), |b| {
            b.iter(|| compile_document(black_box(&json)).unwrap());
        });
    }
    group.finish();
}

fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute");
    for n in [1, 16, 64] {
        let unit = compile_document(&document(n)).unwrap();
        let bytecode: Arc<[u8]> = Arc::from(unit.bytecode.into_boxed_slice());
        let fact_names = unit.context.fact_names();

        group.bench_function(format!("{n}_rules"), |b| {
            b.iter(|| {
                let mut vm = Vm::new(Arc::clone(&bytecode), fact_names.clone()).unwrap();
                for i in 0..n {
                    vm.set_fact(&format!("sensor_{i}"), Value::Int(i as i64 + 1));
                }
                vm.set_fact("mode", Value::String("auto".to_owned()));
                vm.set_fact("override", Value::Bool(false));
                vm.run(&mut DiscardSink).unwrap();
                black_box(vm.facts().len())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_execute);
criterion_main!(benches);
