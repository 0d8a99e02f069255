use address_rs::{
    AddressBook, ComponentItem, GeocodePayload, HierarchyBuilder, Kind, KindRegistry, MemoryStore,
    PayloadComponent, is_consistent,
};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn northcote_items() -> Vec<ComponentItem> {
    vec![
        ComponentItem::new(Kind::STREET_NUMBER, "2", "2"),
        ComponentItem::new(Kind::ROUTE, "Smith Street", "Smith St"),
        ComponentItem::new(Kind::LOCALITY | Kind::POLITICAL, "Northcote", "Northcote"),
        ComponentItem::new(Kind::ADMIN_AREA_2 | Kind::POLITICAL, "Darebin City", "Darebin"),
        ComponentItem::new(Kind::ADMIN_AREA_1 | Kind::POLITICAL, "Victoria", "VIC"),
        ComponentItem::new(Kind::COUNTRY | Kind::POLITICAL, "Australia", "AU"),
        ComponentItem::new(Kind::POSTAL_CODE, "3070", "3070"),
    ]
}

fn bench_hierarchy(c: &mut Criterion) {
    let registry = KindRegistry::standard();
    let items = northcote_items();

    c.bench_function("resolve_hierarchy", |b| {
        let store = MemoryStore::new();
        let builder = HierarchyBuilder::new(&registry, &store);
        b.iter(|| builder.resolve(black_box(&items)))
    });

    // Every iteration after the first hits the dedup path.
    c.bench_function("build_hierarchy_dedup", |b| {
        let store = MemoryStore::new();
        let builder = HierarchyBuilder::new(&registry, &store);
        b.iter(|| builder.build_hierarchy(black_box(&items)))
    });
}

fn bench_assemble(c: &mut Criterion) {
    let book = AddressBook::new();
    let mut counter = 0u64;

    c.bench_function("assemble_new_address", |b| {
        b.iter(|| {
            counter += 1;
            let payload = GeocodePayload {
                raw: Some(format!("{counter} Smith St, Northcote VIC 3070")),
                address_components: vec![
                    PayloadComponent::new(&["street_number"], counter.to_string(), counter.to_string()),
                    PayloadComponent::new(&["route"], "Smith Street", "Smith St"),
                    PayloadComponent::new(&["locality", "political"], "Northcote", "Northcote"),
                    PayloadComponent::new(&["administrative_area_level_1"], "Victoria", "VIC"),
                    PayloadComponent::new(&["country", "political"], "Australia", "AU"),
                    PayloadComponent::new(&["postal_code"], "3070", "3070"),
                ],
                ..Default::default()
            };
            book.assemble(black_box(&payload), None)
        })
    });
}

fn bench_consistency(c: &mut Criterion) {
    let registry = KindRegistry::standard();
    let store = MemoryStore::new();
    let hierarchy = HierarchyBuilder::new(&registry, &store)
        .build(&northcote_items())
        .expect("fixture is a valid hierarchy");

    c.bench_function("is_consistent", |b| {
        b.iter(|| {
            is_consistent(
                black_box("2 Smith St, Northcote VIC 3070, Australia"),
                &hierarchy.components,
            )
        })
    });
}

criterion_group!(benches, bench_hierarchy, bench_assemble, bench_consistency);
criterion_main!(benches);
