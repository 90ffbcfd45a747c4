use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ripple::config::Config;
use ripple::graph::{assemble, Snapshot};
use ripple::impact::compute_blast_radius;
use ripple::model::{ChangeKind, FrameworkHint, Language, SymbolKind};
use ripple::parser::facts::{CallSiteFact, FileFacts, ImportFact, SymbolFact};
use ripple::SymbolId;

fn function_fact(qualname: &str) -> SymbolFact {
    SymbolFact {
        qualname: qualname.to_string(),
        name: qualname.rsplit('.').next().unwrap().to_string(),
        kind: SymbolKind::Function,
        start_line: 3,
        end_line: 6,
        exported: true,
        signature: None,
    }
}

/// One module per link; module `i` calls `step` in module `i - 1`.
fn chain_facts(len: usize) -> Vec<FileFacts> {
    (0..len)
        .map(|i| {
            let mut facts =
                FileFacts::new(format!("m{i}.py"), Language::Python, format!("h{i}"));
            facts.symbols.push(function_fact("step"));
            if i > 0 {
                facts.imports.push(ImportFact {
                    specifier: format!("m{}", i - 1),
                    imported: None,
                    local_name: Some(format!("m{}", i - 1)),
                    line: 1,
                });
                facts.calls.push(CallSiteFact {
                    caller: "step".to_string(),
                    reference: format!("m{}.step", i - 1),
                    line: 4,
                });
            }
            facts
        })
        .collect()
}

/// One hub module with `width` single-function callers.
fn fanout_facts(width: usize) -> Vec<FileFacts> {
    let mut files = vec![{
        let mut hub = FileFacts::new("hub.py".to_string(), Language::Python, "h".to_string());
        hub.symbols.push(function_fact("core"));
        hub
    }];
    for i in 0..width {
        let mut caller =
            FileFacts::new(format!("c{i}.py"), Language::Python, format!("c{i}"));
        caller.symbols.push(function_fact("use_core"));
        caller.imports.push(ImportFact {
            specifier: "hub".to_string(),
            imported: None,
            local_name: Some("hub".to_string()),
            line: 1,
        });
        caller.calls.push(CallSiteFact {
            caller: "use_core".to_string(),
            reference: "hub.core".to_string(),
            line: 4,
        });
        files.push(caller);
    }
    files
}

fn snapshot_from(mut facts: Vec<FileFacts>) -> Snapshot {
    facts.sort_by(|a, b| a.path.cmp(&b.path));
    assemble::assemble(&facts, FrameworkHint::Auto, "bench".to_string()).unwrap()
}

/// Walk depth sweep along a 64-link call chain.
fn bench_chain_depth(c: &mut Criterion) {
    let snapshot = snapshot_from(chain_facts(64));
    let config = Config::default();
    let seeds = [SymbolId::new("m0.py", "step")];

    let mut group = c.benchmark_group("blast_radius_chain");
    for depth in [1usize, 3, 5, 10] {
        group.bench_with_input(format!("depth_{depth}"), &depth, |b, &depth| {
            b.iter(|| {
                let radius = compute_blast_radius(
                    black_box(&snapshot),
                    black_box(&seeds),
                    black_box(ChangeKind::SignatureChange),
                    black_box(depth),
                    black_box(&config),
                );
                black_box(radius)
            })
        });
    }
    group.finish();
}

/// Single-hop expansion over increasingly wide caller fans.
fn bench_fanout_width(c: &mut Criterion) {
    let config = Config::default();
    let seeds = [SymbolId::new("hub.py", "core")];

    let mut group = c.benchmark_group("blast_radius_fanout");
    for width in [64usize, 256, 1024] {
        let snapshot = snapshot_from(fanout_facts(width));
        group.bench_with_input(format!("width_{width}"), &width, |b, _| {
            b.iter(|| {
                let radius = compute_blast_radius(
                    black_box(&snapshot),
                    black_box(&seeds),
                    black_box(ChangeKind::SignatureChange),
                    black_box(1),
                    black_box(&config),
                );
                black_box(radius)
            })
        });
    }
    group.finish();
}

/// Several seeds spread along the chain, overlapping radii.
fn bench_many_seeds(c: &mut Criterion) {
    let snapshot = snapshot_from(chain_facts(64));
    let config = Config::default();
    let seeds: Vec<SymbolId> = (0..64)
        .step_by(8)
        .map(|i| SymbolId::new(&format!("m{i}.py"), "step"))
        .collect();

    c.bench_function("blast_radius_multi_seed_depth3", |b| {
        b.iter(|| {
            let radius = compute_blast_radius(
                black_box(&snapshot),
                black_box(&seeds),
                black_box(ChangeKind::SignatureChange),
                black_box(3),
                black_box(&config),
            );
            black_box(radius)
        })
    });
}

criterion_group!(benches, bench_chain_depth, bench_fanout_width, bench_many_seeds);
criterion_main!(benches);
