#[macro_use]
extern crate criterion;

mod chains {
    use criterion::{BenchmarkId, Criterion};
    use system_topology::{DependencyList, System, SystemId, SystemTopology, TaskPool};

    struct TestSystem(SystemId);

    impl System<()> for TestSystem {
        type SystemData<'a> = ();

        fn id(&self) -> SystemId {
            self.0
        }

        fn run(&self, _data: ()) {}
    }

    const SYSTEM_COUNTS: [usize; 6] = [1, 2, 8, 64, 256, 1024];

    fn bench_topologies(
        c: &mut Criterion,
        name: &str,
        build: impl Fn(usize) -> SystemTopology<()>,
    ) {
        let pool = TaskPool::with_threads(4).unwrap();
        let mut group = c.benchmark_group(name);

        for count in SYSTEM_COUNTS.iter() {
            let mut topology = build(*count);

            group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
                b.iter(|| {
                    topology.step(&pool, &mut ());
                })
            });
        }

        group.finish();
    }

    pub fn no_dependencies(c: &mut Criterion) {
        bench_topologies(c, "chains/no_dependencies", |count| {
            let mut list = DependencyList::new();
            for id in 0..count {
                list.register(TestSystem(SystemId(id)));
            }
            list.build().unwrap()
        });
    }

    pub fn linear(c: &mut Criterion) {
        bench_topologies(c, "chains/linear", |count| {
            let mut list = DependencyList::new();
            list.register(TestSystem(SystemId(0)));
            for id in 1..count {
                list.add(TestSystem(SystemId(id)), &[SystemId(id - 1)]);
            }
            list.build().unwrap()
        });
    }

    pub fn fan_out(c: &mut Criterion) {
        bench_topologies(c, "chains/fan_out", |count| {
            let mut list = DependencyList::new();
            list.register(TestSystem(SystemId(0)));
            for id in 1..count {
                list.add(TestSystem(SystemId(id)), &[SystemId(0)]);
            }
            list.build().unwrap()
        });
    }

    pub fn build(c: &mut Criterion) {
        let mut group = c.benchmark_group("chains/build");

        for count in SYSTEM_COUNTS.iter() {
            group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, count| {
                b.iter(|| {
                    let mut list = DependencyList::new();
                    list.register(TestSystem(SystemId(0)));
                    for id in 1..*count {
                        // Pairs of chains joined every other system.
                        let runs_after = if id % 2 == 0 && id >= 2 {
                            vec![SystemId(id - 1), SystemId(id - 2)]
                        } else {
                            vec![SystemId(id - 1)]
                        };
                        list.add(TestSystem(SystemId(id)), &runs_after);
                    }
                    list.build().unwrap()
                })
            });
        }

        group.finish();
    }
}

criterion_group!(
    chains,
    chains::no_dependencies,
    chains::linear,
    chains::fan_out,
    chains::build
);
criterion_main!(chains);
