//! Uniform RPC options across a service.
//!
//! Templates iterate rpcs and index into their options; every rpc must
//! carry the same keys. The union of all rpcs' option shapes is stored on
//! the service under [`RPC_OPTIONS_KEY`], and each rpc is zero-filled
//! against it. The first shape seen for a key wins on conflicts.

use std::collections::BTreeMap;

use crate::ir::{Rpc, Service};
use crate::options::{OptionMap, OptionValue, Scalar};

pub const RPC_OPTIONS_KEY: &str = "RpcOptions";

/// Type-level shape of an option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionShape {
    Leaf(&'static str),
    List(Box<OptionShape>),
    Map(BTreeMap<String, OptionShape>),
    /// Element shape of an empty list.
    Unknown,
}

impl OptionShape {
    pub fn of(value: &OptionValue) -> OptionShape {
        match value {
            OptionValue::Scalar(scalar) => OptionShape::Leaf(scalar.type_name()),
            OptionValue::List(items) => OptionShape::List(Box::new(
                items.iter().map(OptionShape::of).fold(OptionShape::Unknown, OptionShape::merge),
            )),
            OptionValue::Map(map) => OptionShape::Map(map_shape(map)),
        }
    }

    pub fn merge(self, other: OptionShape) -> OptionShape {
        match (self, other) {
            (OptionShape::Unknown, other) => other,
            (OptionShape::Map(mut left), OptionShape::Map(right)) => {
                merge_maps(&mut left, right);
                OptionShape::Map(left)
            }
            (OptionShape::List(left), OptionShape::List(right)) => OptionShape::List(Box::new(left.merge(*right))),
            (first, _) => first,
        }
    }

    /// The shape as a value templates can walk: leaves become their type
    /// name and lists hold one element describing their items.
    pub fn to_value(&self) -> OptionValue {
        match self {
            OptionShape::Leaf(type_name) => Scalar::String((*type_name).to_string()).into(),
            OptionShape::List(item) => match **item {
                OptionShape::Unknown => OptionValue::List(Vec::new()),
                ref item => OptionValue::List(vec![item.to_value()]),
            },
            OptionShape::Map(map) => {
                OptionValue::Map(map.iter().map(|(key, shape)| (key.clone(), shape.to_value())).collect())
            }
            OptionShape::Unknown => OptionValue::Map(OptionMap::new()),
        }
    }

    pub fn zero(&self) -> OptionValue {
        match self {
            OptionShape::Leaf(type_name) => Scalar::zero(type_name).into(),
            OptionShape::List(_) => OptionValue::List(Vec::new()),
            OptionShape::Map(map) => {
                OptionValue::Map(map.iter().map(|(key, shape)| (key.clone(), shape.zero())).collect())
            }
            OptionShape::Unknown => OptionValue::Map(OptionMap::new()),
        }
    }

    /// Inserts zero values for every key of the shape missing in `value`.
    pub fn fill(&self, value: &mut OptionValue) {
        match (self, value) {
            (OptionShape::Map(shape), OptionValue::Map(map)) => fill_map(shape, map),
            (OptionShape::List(item), OptionValue::List(items)) => {
                for value in items {
                    item.fill(value);
                }
            }
            _ => {}
        }
    }
}

fn map_shape(map: &OptionMap) -> BTreeMap<String, OptionShape> {
    map.iter().map(|(key, value)| (key.clone(), OptionShape::of(value))).collect()
}

fn merge_maps(left: &mut BTreeMap<String, OptionShape>, right: BTreeMap<String, OptionShape>) {
    for (key, shape) in right {
        match left.remove(&key) {
            Some(existing) => {
                left.insert(key, existing.merge(shape));
            }
            None => {
                left.insert(key, shape);
            }
        }
    }
}

fn fill_map(shape: &BTreeMap<String, OptionShape>, map: &mut OptionMap) {
    for (key, sub) in shape {
        match map.get_mut(key) {
            Some(value) => sub.fill(value),
            None => {
                map.insert(key.clone(), sub.zero());
            }
        }
    }
}

/// Union of the option shapes of every rpc.
pub fn concat_options(rpcs: &[Rpc]) -> BTreeMap<String, OptionShape> {
    let mut union = BTreeMap::new();
    for rpc in rpcs {
        merge_maps(&mut union, map_shape(&rpc.options));
    }
    union
}

/// Zero-fills every rpc's options against `union`.
pub fn concat_option_values(rpcs: &mut [Rpc], union: &BTreeMap<String, OptionShape>) {
    for rpc in rpcs {
        fill_map(union, &mut rpc.options);
    }
}

pub fn normalize_service(service: &mut Service) {
    let union = concat_options(&service.rpcs);
    concat_option_values(&mut service.rpcs, &union);
    service
        .options
        .insert(RPC_OPTIONS_KEY.to_string(), OptionShape::Map(union).to_value());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FileId;

    fn string(s: &str) -> OptionValue {
        Scalar::String(s.to_string()).into()
    }

    fn map(entries: Vec<(&str, OptionValue)>) -> OptionValue {
        OptionValue::Map(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn rpc(name: &str, options: Vec<(&str, OptionValue)>) -> Rpc {
        Rpc {
            name: name.to_string(),
            input: "Req".to_string(),
            output: "Res".to_string(),
            input_full_name: "demo.Req".to_string(),
            output_full_name: "demo.Res".to_string(),
            client_streaming: false,
            server_streaming: false,
            options: options.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            service: "Users".to_string(),
        }
    }

    fn service(rpcs: Vec<Rpc>) -> Service {
        Service {
            name: "Users".to_string(),
            full_name: "demo.Users".to_string(),
            options: OptionMap::new(),
            rpcs,
            code_generation: Vec::new(),
            file: FileId(0),
        }
    }

    #[test]
    fn union_of_keys_is_zero_filled() {
        let mut svc = service(vec![
            rpc("A", vec![("Http", map(vec![("X", string("a")), ("Y", Scalar::Int(1).into())]))]),
            rpc("B", vec![("Http", map(vec![("X", string("b")), ("Z", Scalar::Bool(true).into())]))]),
        ]);
        normalize_service(&mut svc);

        let a = svc.rpcs[0].options["Http"].as_map().unwrap();
        let b = svc.rpcs[1].options["Http"].as_map().unwrap();
        for options in [a, b] {
            let keys: Vec<&str> = options.keys().map(String::as_str).collect();
            assert_eq!(keys, vec!["X", "Y", "Z"]);
        }
        assert_eq!(a["Z"], Scalar::Bool(false).into());
        assert_eq!(b["Y"], Scalar::Int(0).into());
        assert_eq!(b["X"], string("b"));

        let union = svc.options[RPC_OPTIONS_KEY].as_map().unwrap()["Http"].as_map().unwrap();
        assert_eq!(union["X"], string("string"));
        assert_eq!(union["Y"], string("int64"));
        assert_eq!(union["Z"], string("bool"));
    }

    #[test]
    fn missing_top_level_option_gets_zero_map() {
        let mut svc = service(vec![
            rpc("A", vec![("Auth", map(vec![("Role", string("admin"))]))]),
            rpc("B", vec![]),
        ]);
        normalize_service(&mut svc);
        assert_eq!(svc.rpcs[1].options["Auth"], map(vec![("Role", string(""))]));
    }

    #[test]
    fn list_elements_are_filled_against_the_item_shape() {
        let mut svc = service(vec![
            rpc("A", vec![("Rules", OptionValue::List(vec![map(vec![("A", string("x"))])]))]),
            rpc(
                "B",
                vec![("Rules", OptionValue::List(vec![map(vec![("B", Scalar::Uint(2).into())])]))],
            ),
            rpc("C", vec![]),
        ]);
        normalize_service(&mut svc);

        let a = svc.rpcs[0].options["Rules"].as_list().unwrap();
        assert_eq!(a[0], map(vec![("A", string("x")), ("B", Scalar::Uint(0).into())]));
        assert_eq!(svc.rpcs[2].options["Rules"], OptionValue::List(Vec::new()));

        let shape = svc.options[RPC_OPTIONS_KEY].as_map().unwrap()["Rules"].as_list().unwrap();
        assert_eq!(shape.len(), 1);
        assert_eq!(shape[0], map(vec![("A", string("string")), ("B", string("uint64"))]));
    }

    #[test]
    fn first_shape_wins_on_conflict() {
        let mut svc = service(vec![
            rpc("A", vec![("Mode", string("fast"))]),
            rpc("B", vec![("Mode", map(vec![("Level", Scalar::Int(2).into())]))]),
        ]);
        normalize_service(&mut svc);
        assert_eq!(svc.options[RPC_OPTIONS_KEY].as_map().unwrap()["Mode"], string("string"));
        assert_eq!(svc.rpcs[1].options["Mode"], map(vec![("Level", Scalar::Int(2).into())]));
    }

    #[test]
    fn service_without_rpcs_gets_empty_union() {
        let mut svc = service(vec![]);
        normalize_service(&mut svc);
        assert_eq!(svc.options[RPC_OPTIONS_KEY], OptionValue::Map(OptionMap::new()));
    }
}
