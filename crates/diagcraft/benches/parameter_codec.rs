use std::{collections::BTreeMap, sync::Arc};

use criterion::{Criterion, criterion_group, criterion_main};
use diagcraft::{
    converter::{Converter, DiagCodedType},
    diaglayer::{Database, DiagLayer},
    odxlink::{OdxLinkId, OdxLinkRef},
    parameters::{ConstantParameter, DopReference, ParameterBase},
    state::DecodeMode,
    structure::Structure,
    value::BaseDataType,
};

fn gen_database(param_count: usize) -> Database {
    let mut layer = DiagLayer::new("ecu", OdxLinkId::new("DL.ecu", "ECU"));
    layer.converters.push(Arc::new(Converter::new(
        "uint16",
        OdxLinkId::new("DOP.uint16", "ECU"),
        DiagCodedType::new(BaseDataType::AUInt32, 16),
        BaseDataType::AUInt32,
    )));

    let mut parameters = Vec::with_capacity(param_count);
    for i in 0..param_count {
        let mut base = ParameterBase::new(
            format!("p{}", i),
            DopReference::Id(OdxLinkRef::new("DOP.uint16", "ECU")),
        );
        base.set_byte_position(i * 2);
        parameters.push(ConstantParameter::new(base, format!("{}", i * 31 % 65536)).into());
    }
    layer.structures.push(Structure::new("request", parameters));

    let mut db = Database::new(vec![layer]).unwrap();
    db.resolve().unwrap();
    db
}

fn bench_parameter_codec(c: &mut Criterion) {
    for &param_count in &[1usize, 10, 50, 100] {
        let db = gen_database(param_count);
        let request = db.layer("ecu").unwrap().structure("request").unwrap();
        let packet = request.encode(BTreeMap::new()).unwrap();

        c.bench_function(&format!("encode_{}_constants", param_count), |b| {
            b.iter(|| {
                let _ = request.encode(BTreeMap::new()).unwrap();
            })
        });

        c.bench_function(&format!("decode_{}_constants", param_count), |b| {
            b.iter(|| {
                let _ = request.decode(&packet, DecodeMode::Lenient).unwrap();
            })
        });
    }
}

criterion_group!(benches, bench_parameter_codec);
criterion_main!(benches);
