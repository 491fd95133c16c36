mod common;

use brrtdispatch::binding::{ParamType, TargetType};
use brrtdispatch::dispatcher::DispatchCore;
use brrtdispatch::error::{ConfigError, DispatchError};
use brrtdispatch::{Bindable, Endpoint, ParamEnum, ParameterSpec, SourceKind, ViewResult};
use common::{request, sink};
use http::{Method, StatusCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ParamEnum)]
enum Species {
    #[param(rename = "cat")]
    Cat,
    #[param(rename = "dog")]
    Dog,
    Axolotl,
}

#[derive(Debug, Default, PartialEq, Bindable)]
struct NewPet {
    name: String,
    #[bind(rename = "age_years")]
    age: u8,
    vaccinated: bool,
    tags: Vec<String>,
    nickname: Option<String>,
    #[bind(skip)]
    internal_id: u64,
}

#[test]
fn test_param_enum_target_lists_variants() {
    let TargetType::Enum { name, variants } = Species::target_type() else {
        panic!("expected an enum target");
    };
    assert_eq!(name, "Species");
    assert_eq!(variants, &["cat", "dog", "Axolotl"]);
}

#[test]
fn test_bindable_exposes_renamed_keys_and_skips() {
    let keys: Vec<&str> = <NewPet as brrtdispatch::binding::Bindable>::field_setters()
        .iter()
        .map(|s| s.key)
        .collect();
    assert_eq!(keys, vec!["name", "age_years", "vaccinated", "tags", "nickname"]);
    assert!(NewPet::target_type().is_object());
    assert_eq!(ParameterSpec::infer::<NewPet>("pet").kind(), SourceKind::BoundObject);
    assert_eq!(ParameterSpec::infer::<Species>("s").kind(), SourceKind::NamedValue);
}

fn pet_core() -> DispatchCore {
    let mut builder = DispatchCore::builder();
    builder
        .register(
            "/pets",
            "POST",
            Endpoint::declarative("add_pet", |args| {
                let pet: NewPet = args.take_object("pet")?;
                let species: Species = args.take("species")?;
                Ok(ViewResult::new("pet")
                    .with("name", pet.name)
                    .with("age", pet.age)
                    .with("vaccinated", pet.vaccinated)
                    .with("tags", pet.tags)
                    .with("nickname", pet.nickname)
                    .with("species", format!("{species:?}"))
                    .into())
            })
            .param(ParameterSpec::object::<NewPet>("pet"))
            .param(ParameterSpec::named::<Species>("species").default_value("Axolotl")),
        )
        .unwrap();
    builder.build().unwrap()
}

#[test]
fn test_bound_object_from_form_body() {
    let core = pet_core();
    let mut ctx = brrtdispatch::RequestContext::builder(Method::POST, "/pets?species=dog")
        .form_body(b"name=Rex&age_years=4&vaccinated=on&tags=good,loud")
        .build();
    let mut res = sink();

    let outcome = core.dispatch(&mut ctx, &mut res);

    assert!(outcome.is_success());
    let body = res.json().unwrap();
    assert_eq!(body["name"], "Rex");
    assert_eq!(body["age"], 4);
    assert_eq!(body["vaccinated"], true);
    assert_eq!(body["tags"], serde_json::json!(["good", "loud"]));
    assert!(body["nickname"].is_null());
    assert_eq!(body["species"], "Dog");
}

#[test]
fn test_missing_fields_keep_zero_values() {
    let core = pet_core();
    let mut res = sink();

    let outcome = core.dispatch(&mut request(Method::POST, "/pets"), &mut res);

    assert!(outcome.is_success());
    let body = res.json().unwrap();
    assert_eq!(body["name"], "");
    assert_eq!(body["age"], 0);
    assert_eq!(body["species"], "Axolotl");
}

#[test]
fn test_bad_field_value_is_type_conversion() {
    let core = pet_core();
    let mut res = sink();

    let outcome = core.dispatch(&mut request(Method::POST, "/pets?age_years=300"), &mut res);

    assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
    assert!(matches!(
        outcome.error,
        Some(DispatchError::Binding(ref e)) if e.parameter() == "age_years"
    ));
    assert_eq!(res.json().unwrap()["error"], "type_conversion");
}

#[test]
fn test_unknown_enum_variant_is_type_conversion() {
    let core = pet_core();

    let outcome = core.dispatch(&mut request(Method::POST, "/pets?species=Cat"), &mut sink());

    assert!(matches!(
        outcome.error,
        Some(DispatchError::Binding(ref e)) if e.parameter() == "species"
    ));
}

#[test]
fn test_invalid_enum_default_rejected_at_registration() {
    let mut builder = DispatchCore::builder();
    let err = builder
        .register(
            "/pets",
            "GET",
            Endpoint::declarative("list", |_| Ok(ViewResult::new("pets").into()))
                .param(ParameterSpec::named::<Species>("species").default_value("hamster")),
        )
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDefault { .. }));
}
