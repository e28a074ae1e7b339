use std::sync::Arc;

use chrono::{DateTime, TimeDelta};
use veles_model::{
    ArrayValue, ClassDef, CollectionAttr, CollectionStyle, Container, CustomSerializer, CyclePolicy, DictionaryAttr,
    EnumDef,
    EnumValue, ExceptionPolicy, Guid, InterfaceDef, MemberDef, Object, ObjectRef, Placement, SerializationContext,
    SerializerOptions, Severity, TextEmbedding, TypeRegistry, Value,
};
use veles_xml::{NodeId, XName, XmlDocument};

use crate::{real_type_attribute, Error, XmlSerializer};

fn person_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.add_class(
        ClassDef::new("Person")
            .member(MemberDef::new("Name", "string").attribute_for("."))
            .member(MemberDef::new("Age", "i32"))
            .member(MemberDef::new("Email", "string"))
            .member(MemberDef::new("Tags", "List<string>")),
    );
    registry
}

fn serializer(registry: TypeRegistry, type_name: &str) -> XmlSerializer {
    XmlSerializer::new(type_name, Arc::new(registry))
}

fn round_trip(serializer: &mut XmlSerializer, value: &Value) -> ObjectRef {
    let xml = serializer.serialize_to_string(value).unwrap();
    let back = serializer.deserialize_from_str(&xml).unwrap();
    back.as_object().cloned().unwrap()
}

fn list(items: Vec<Value>) -> Value {
    Value::from(Object::with_container("List<string>", Container::List(items)))
}

fn container(object: &ObjectRef, field: &str) -> Container {
    let value = object.get(field).unwrap();
    let inner = value.as_object().unwrap().read();
    inner.container.clone().unwrap()
}

fn root(doc: &XmlDocument) -> NodeId {
    doc.root().unwrap()
}

#[test]
fn test_round_trip_person() {
    let mut ser = serializer(person_registry(), "Person");
    let person = Value::from(
        Object::new("Person")
            .with("Name", "Ada")
            .with("Age", 36)
            .with("Email", "ada@example.com")
            .with("Tags", list(vec!["math".into(), "engines".into()])),
    );

    let doc = ser.serialize(&person).unwrap();
    let r = root(&doc);
    assert_eq!(doc.name(r), Some(&XName::new("Person")));
    assert_eq!(doc.attribute(r, &XName::new("Name")), Some("Ada"));
    let tags = doc.first_child(r, &XName::new("Tags")).unwrap();
    assert_eq!(doc.child_elements_named(tags, &XName::new("String")).count(), 2);

    let back = round_trip(&mut ser, &person);
    assert_eq!(back.get("Name"), Some(Value::from("Ada")));
    assert_eq!(back.get("Age"), Some(Value::Int32(36)));
    assert_eq!(back.get("Email"), Some(Value::from("ada@example.com")));
    assert_eq!(
        container(&back, "Tags"),
        Container::List(vec!["math".into(), "engines".into()])
    );
    assert!(ser.parsing_errors().is_empty());
}

#[test]
fn test_null_members_written_empty() {
    let mut ser = serializer(person_registry(), "Person");
    let person = Value::from(Object::new("Person").with("Name", "Bo").with("Age", 4));

    let doc = ser.serialize(&person).unwrap();
    let email = doc.first_child(root(&doc), &XName::new("Email")).unwrap();
    assert!(doc.is_empty_element(email));

    let back = ser.deserialize(&doc).unwrap();
    let back = back.as_object().unwrap();
    assert_eq!(back.get("Email"), Some(Value::Null));
    assert_eq!(container(back, "Tags"), Container::List(vec![]));
}

#[test]
fn test_empty_string_differs_from_null() {
    let mut ser = serializer(person_registry(), "Person");
    let person = Value::from(
        Object::new("Person")
            .with("Name", "")
            .with("Age", 4)
            .with("Email", "")
            .with("Tags", list(vec!["".into()])),
    );

    let xml = ser.serialize_to_string(&person).unwrap();
    assert!(xml.contains("<Email></Email>"));
    assert!(xml.contains("<String></String>"));

    let back = round_trip(&mut ser, &person);
    assert_eq!(back.get("Name"), Some(Value::from("")));
    assert_eq!(back.get("Email"), Some(Value::from("")));
    assert_eq!(container(&back, "Tags"), Container::List(vec!["".into()]));

    let value = ser
        .deserialize_from_str(r#"<Person Name="x"><Age>4</Age><Email/><Tags/></Person>"#)
        .unwrap();
    assert_eq!(value.as_object().unwrap().get("Email"), Some(Value::Null));
}

#[test]
fn test_empty_value_text_keeps_its_element() {
    let mut registry = TypeRegistry::new();
    registry.add_class(ClassDef::new("Label").member(MemberDef::new("Text", "string").value_for(".")));
    registry.add_class(ClassDef::new("Panel").member(MemberDef::new("Caption", "Label")));
    let mut ser = serializer(registry, "Panel");

    let panel = Value::from(Object::new("Panel").with("Caption", Object::new("Label").with("Text", "")));
    let doc = ser.serialize(&panel).unwrap();
    let caption = doc.first_child(root(&doc), &XName::new("Caption")).unwrap();
    assert!(doc.has_text(caption));

    let back = round_trip(&mut ser, &panel);
    let caption = back.get("Caption").unwrap();
    assert_eq!(caption.as_object().unwrap().get("Text"), Some(Value::from("")));
    assert!(ser.parsing_errors().is_empty());
}

#[test]
fn test_null_members_skipped() {
    let options = SerializerOptions::default().with_serialize_null_objects(false);
    let mut ser = serializer(person_registry(), "Person").with_options(options);
    let person = Value::from(Object::new("Person").with("Name", "Bo").with("Age", 4));

    let doc = ser.serialize(&person).unwrap();
    assert!(doc.first_child(root(&doc), &XName::new("Email")).is_none());

    let back = ser.deserialize(&doc).unwrap();
    let back = back.as_object().unwrap();
    assert_eq!(back.get("Email"), None);
    assert!(ser.parsing_errors().is_empty());
}

#[test]
fn test_missing_member_uses_default() {
    let mut registry = TypeRegistry::new();
    registry.add_class(
        ClassDef::new("Config")
            .member(MemberDef::new("Name", "string"))
            .member(MemberDef::new("Retries", "i32").error_if_missed(Severity::Warning, Some(Value::from("5"))))
            .member(MemberDef::new("Verbose", "bool").default_value(true)),
    );
    let options = SerializerOptions::default().with_exception_policy(ExceptionPolicy::ThrowErrorsOnly);
    let mut ser = serializer(registry, "Config").with_options(options);

    let value = ser.deserialize_from_str("<Config><Name>x</Name></Config>").unwrap();
    let config = value.as_object().unwrap();
    assert_eq!(config.get("Retries"), Some(Value::Int32(5)));
    assert_eq!(config.get("Verbose"), Some(Value::Bool(true)));

    let errors = ser.parsing_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors.has_warnings());
    let first = errors.iter().next().unwrap();
    assert!(matches!(&first.error, Error::ElementMissing { element, .. } if element == "Retries"));
}

#[test]
fn test_missing_member_throws() {
    let mut ser = serializer(person_registry(), "Person");
    let result = ser.deserialize_from_str(r#"<Person Name="x"><Email/><Tags/></Person>"#);

    assert!(matches!(result, Err(Error::ElementMissing { ref element, .. }) if element == "Age"));
    assert_eq!(ser.parsing_errors().len(), 1);
    assert!(ser.parsing_errors().has_errors());
}

#[test]
fn test_collect_errors_without_throwing() {
    let options = SerializerOptions::default().with_exception_policy(ExceptionPolicy::DoNotThrow);
    let mut ser = serializer(person_registry(), "Person").with_options(options);

    let value = ser
        .deserialize_from_str(r#"<Person Name="x"><Age>abc</Age><Tags/></Person>"#)
        .unwrap();
    let person = value.as_object().unwrap();
    assert_eq!(person.get("Age"), Some(Value::Null));
    assert_eq!(person.get("Name"), Some(Value::from("x")));

    let errors: Vec<&Error> = ser.parsing_errors().iter().map(|e| &e.error).collect();
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .any(|e| matches!(e, Error::BadlyFormedInput { member, value, .. } if member == "Age" && value == "abc")));
    assert!(errors.iter().any(|e| matches!(e, Error::ElementMissing { element, .. } if element == "Email")));
}

fn badge_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.add_class(
        ClassDef::new("Badge")
            .member(MemberDef::new("Name", "string").attribute_for("."))
            .member(MemberDef::new("Age", "i32").attribute_for(".")),
    );
    registry
}

#[test]
fn test_malformed_attribute_collect_or_throw() {
    let xml = r#"<Badge Name="x" Age="abc"/>"#;

    for policy in [ExceptionPolicy::ThrowWarningsAndErrors, ExceptionPolicy::ThrowErrorsOnly] {
        let options = SerializerOptions::default().with_exception_policy(policy);
        let mut ser = serializer(badge_registry(), "Badge").with_options(options);
        let result = ser.deserialize_from_str(xml);
        assert!(
            matches!(result, Err(Error::BadlyFormedInput { ref member, ref value, .. }) if member == "Age" && value == "abc"),
            "{:?} should throw",
            policy
        );
        assert_eq!(ser.parsing_errors().len(), 1);
    }

    let options = SerializerOptions::default().with_exception_policy(ExceptionPolicy::DoNotThrow);
    let mut ser = serializer(badge_registry(), "Badge").with_options(options);
    let value = ser.deserialize_from_str(xml).unwrap();
    let badge = value.as_object().unwrap();
    assert_eq!(badge.get("Name"), Some(Value::from("x")));
    assert_eq!(badge.get("Age"), Some(Value::Null));

    let errors: Vec<&Error> = ser.parsing_errors().iter().map(|e| &e.error).collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], Error::BadlyFormedInput { member, .. } if member == "Age"));
}

#[test]
fn test_errors_cleared_between_operations() {
    let options = SerializerOptions::default().with_exception_policy(ExceptionPolicy::DoNotThrow);
    let mut ser = serializer(person_registry(), "Person").with_options(options);

    ser.deserialize_from_str("<Person/>").unwrap();
    assert!(!ser.parsing_errors().is_empty());

    ser.serialize(&Value::from(Object::new("Person").with("Age", 1))).unwrap();
    assert!(ser.parsing_errors().is_empty());
}

#[test]
fn test_badly_formed_xml() {
    let mut ser = serializer(person_registry(), "Person");
    let result = ser.deserialize_from_str("<Person><Name>");
    assert!(matches!(result, Err(Error::BadlyFormedXml(_))));
    assert_eq!(ser.parsing_errors().len(), 1);

    let options = SerializerOptions::default().with_exception_policy(ExceptionPolicy::DoNotThrow);
    let mut ser = ser.with_options(options);
    assert_eq!(ser.deserialize_from_str("<Person").unwrap(), Value::Null);
    assert!(ser.parsing_errors().has_errors());
}

#[test]
fn test_type_mismatch() {
    let mut ser = serializer(person_registry(), "Person");
    let result = ser.serialize(&Value::Int32(3));
    assert!(matches!(result, Err(Error::ObjectTypeMismatch { .. })));
}

fn node_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.add_class(
        ClassDef::new("Node")
            .member(MemberDef::new("Name", "string"))
            .member(MemberDef::new("Next", "Node")),
    );
    registry
}

#[test]
fn test_cycle_skipped() {
    let mut ser = serializer(node_registry(), "Node");
    let node = Object::new("Node").with("Name", "loop").into_ref();
    node.set("Next", node.clone());

    let doc = ser.serialize(&Value::Object(node.clone())).unwrap();
    let next = doc.first_child(root(&doc), &XName::new("Next")).unwrap();
    assert!(doc.is_empty_element(next));

    let back = ser.deserialize(&doc).unwrap();
    let back = back.as_object().unwrap();
    assert_eq!(back.get("Name"), Some(Value::from("loop")));
    assert_eq!(back.get("Next"), Some(Value::Null));
}

#[test]
fn test_cycle_throws() {
    let options = SerializerOptions::default().with_throw_on_cycles(true);
    let mut ser = serializer(node_registry(), "Node").with_options(options);
    let node = Object::new("Node").with("Name", "loop").into_ref();
    node.set("Next", node.clone());

    let result = ser.serialize(&Value::Object(node));
    assert!(matches!(result, Err(Error::CannotSerializeSelfReferentialTypes { .. })));
    assert!(ser.parsing_errors().has_errors());
}

#[test]
fn test_type_cycle_policy_overrides_option() {
    let node_with = |policy| {
        let mut registry = TypeRegistry::new();
        registry.add_class(
            ClassDef::new("Node")
                .cycles(policy)
                .member(MemberDef::new("Name", "string"))
                .member(MemberDef::new("Next", "Node")),
        );
        registry
    };
    let looped = || {
        let node = Object::new("Node").with("Name", "loop").into_ref();
        node.set("Next", node.clone());
        Value::Object(node)
    };

    let mut ser = serializer(node_with(CyclePolicy::Throw), "Node");
    let result = ser.serialize(&looped());
    assert!(matches!(result, Err(Error::CannotSerializeSelfReferentialTypes { .. })));

    let options = SerializerOptions::default().with_throw_on_cycles(true);
    let mut ser = serializer(node_with(CyclePolicy::Skip), "Node").with_options(options);
    let doc = ser.serialize(&looped()).unwrap();
    let next = doc.first_child(root(&doc), &XName::new("Next")).unwrap();
    assert!(doc.is_empty_element(next));
    assert!(ser.parsing_errors().is_empty());
}

#[test]
fn test_shared_object_is_not_a_cycle() {
    let mut registry = node_registry();
    registry.add_class(
        ClassDef::new("Pair")
            .member(MemberDef::new("Left", "Node"))
            .member(MemberDef::new("Right", "Node")),
    );
    let mut ser = serializer(registry, "Pair");
    let shared = Value::from(Object::new("Node").with("Name", "s"));
    let pair = Value::from(Object::new("Pair").with("Left", shared.clone()).with("Right", shared));

    let back = round_trip(&mut ser, &pair);
    let right = back.get("Right").unwrap();
    assert_eq!(right.as_object().unwrap().get("Name"), Some(Value::from("s")));
}

fn shapes_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .add_interface(InterfaceDef::new("IShape"))
        .add_class(
            ClassDef::new("Circle")
                .implements("IShape")
                .member(MemberDef::new("Radius", "f64")),
        )
        .add_class(
            ClassDef::new("Square")
                .implements("IShape")
                .member(MemberDef::new("Side", "f64")),
        )
        .add_class(
            ClassDef::new("Drawing")
                .member(MemberDef::new("Main", "IShape"))
                .member(MemberDef::new("Shapes", "List<IShape>"))
                .member(MemberDef::new("Extra", "object")),
        );
    registry
}

fn drawing() -> Value {
    let circle = Value::from(Object::new("Circle").with("Radius", 1.5));
    let square = Value::from(Object::new("Square").with("Side", 2.0));
    let shapes = Object::with_container("List<IShape>", Container::List(vec![circle.clone(), square]));
    Value::from(
        Object::new("Drawing")
            .with("Main", circle)
            .with("Shapes", shapes)
            .with("Extra", 7),
    )
}

#[test]
fn test_interface_members_carry_real_type() {
    let mut ser = serializer(shapes_registry(), "Drawing");
    let value = drawing();

    let doc = ser.serialize(&value).unwrap();
    let r = root(&doc);
    let main = doc.first_child(r, &XName::new("Main")).unwrap();
    assert_eq!(doc.attribute(main, &real_type_attribute()), Some("Circle"));
    let extra = doc.first_child(r, &XName::new("Extra")).unwrap();
    assert_eq!(doc.attribute(extra, &real_type_attribute()), Some("i32"));

    let back = round_trip(&mut ser, &value);
    let main = back.get("Main").unwrap();
    assert_eq!(main.as_object().unwrap().type_name(), "Circle");
    assert_eq!(main.as_object().unwrap().get("Radius"), Some(Value::Double(1.5)));
    assert_eq!(back.get("Extra"), Some(Value::Int32(7)));

    let Container::List(shapes) = container(&back, "Shapes") else {
        panic!("expected a list");
    };
    let kinds: Vec<String> = shapes.iter().map(|s| s.as_object().unwrap().type_name()).collect();
    assert_eq!(kinds, ["Circle", "Square"]);
}

#[test]
fn test_suppressed_metadata() {
    let options = SerializerOptions::default().with_suppress_metadata(true);
    let mut ser = serializer(shapes_registry(), "Drawing").with_options(options);

    let xml = ser.serialize_to_string(&drawing()).unwrap();
    assert!(!xml.contains("realtype"), "{}", xml);
}

#[test]
fn test_abstract_member_without_real_type() {
    let options = SerializerOptions::default().with_exception_policy(ExceptionPolicy::DoNotThrow);
    let mut ser = serializer(shapes_registry(), "Drawing").with_options(options);

    let value = ser
        .deserialize_from_str("<Drawing><Main><Radius>1</Radius></Main><Shapes/><Extra/></Drawing>")
        .unwrap();
    assert_eq!(value.as_object().unwrap().get("Main"), Some(Value::Null));
    assert!(ser
        .parsing_errors()
        .iter()
        .any(|e| matches!(e.error, Error::BadlyFormedInput { .. })));
}

#[test]
fn test_real_type_element_names() {
    let mut registry = shapes_registry();
    registry.add_class(
        ClassDef::new("Frame").member(
            MemberDef::new("Shape", "IShape")
                .real_type("Circle", "Round")
                .real_type("Square", "Boxy"),
        ),
    );
    let mut ser = serializer(registry, "Frame");
    let frame = Value::from(Object::new("Frame").with("Shape", Object::new("Square").with("Side", 3.0)));

    let doc = ser.serialize(&frame).unwrap();
    let boxy = doc.first_child(root(&doc), &XName::new("Boxy")).unwrap();
    assert!(!doc.has_attribute(boxy, &real_type_attribute()));

    let back = round_trip(&mut ser, &frame);
    let shape = back.get("Shape").unwrap();
    assert_eq!(shape.as_object().unwrap().type_name(), "Square");
}

fn numbers_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.add_class(
        ClassDef::new("Data")
            .member(MemberDef::new("Ids", "List<i32>").serially(" ").attribute_for("."))
            .member(MemberDef::new("Values", "List<i32>").serially(","))
            .member(
                MemberDef::new("Words", "List<string>")
                    .collection(CollectionAttr::new(CollectionStyle::RecursiveWithNoContainingElement)),
            )
            .member(MemberDef::new("Label", "string")),
    );
    registry
}

fn int_list(items: &[i32]) -> Object {
    Object::with_container("List<i32>", Container::List(items.iter().map(|&i| Value::Int32(i)).collect()))
}

#[test]
fn test_serial_and_unwrapped_collections() {
    let mut ser = serializer(numbers_registry(), "Data");
    let words = Object::with_container("List<string>", Container::List(vec!["a".into(), "b".into()]));
    let data = Value::from(
        Object::new("Data")
            .with("Ids", int_list(&[7, 8]))
            .with("Values", int_list(&[1, 2, 3]))
            .with("Words", words)
            .with("Label", "l"),
    );

    let doc = ser.serialize(&data).unwrap();
    let r = root(&doc);
    assert_eq!(doc.attribute(r, &XName::new("Ids")), Some("7 8"));
    let values = doc.first_child(r, &XName::new("Values")).unwrap();
    assert_eq!(doc.text(values), "1,2,3");
    assert!(doc.first_child(r, &XName::new("Words")).is_none());
    assert_eq!(doc.child_elements_named(r, &XName::new("String")).count(), 2);

    let back = round_trip(&mut ser, &data);
    assert_eq!(container(&back, "Ids"), Container::List(vec![Value::Int32(7), Value::Int32(8)]));
    assert_eq!(
        container(&back, "Values"),
        Container::List(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)])
    );
    assert_eq!(container(&back, "Words"), Container::List(vec!["a".into(), "b".into()]));
    assert_eq!(back.get("Label"), Some(Value::from("l")));
}

#[test]
fn test_missing_unwrapped_collection_reported() {
    let mut registry = TypeRegistry::new();
    registry.add_class(
        ClassDef::new("Bag")
            .member(
                MemberDef::new("Words", "List<string>")
                    .collection(CollectionAttr::new(CollectionStyle::RecursiveWithNoContainingElement))
                    .error_if_missed(Severity::Warning, None),
            )
            .member(MemberDef::new("Label", "string")),
    );
    let options = SerializerOptions::default().with_exception_policy(ExceptionPolicy::ThrowErrorsOnly);
    let mut ser = serializer(registry, "Bag").with_options(options);

    let value = ser.deserialize_from_str("<Bag><Label>x</Label></Bag>").unwrap();
    assert_eq!(value.as_object().unwrap().get("Words"), None);
    let errors = ser.parsing_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors.has_warnings());
    let first = errors.iter().next().unwrap();
    assert!(matches!(&first.error, Error::ElementMissing { element, .. } if element == "Words"));

    let value = ser
        .deserialize_from_str("<Bag><String>a</String><Label>x</Label></Bag>")
        .unwrap();
    let bag = value.as_object().unwrap();
    assert_eq!(container(bag, "Words"), Container::List(vec!["a".into()]));
    assert!(ser.parsing_errors().is_empty());
}

#[test]
fn test_serial_items_split_on_whitespace() {
    let mut ser = serializer(numbers_registry(), "Data");
    let value = ser
        .deserialize_from_str("<Data Ids=\" 4   5\n6 \"><Values>1, 2</Values><Label>x</Label></Data>")
        .unwrap();
    let data = value.as_object().unwrap();

    assert_eq!(
        container(data, "Ids"),
        Container::List(vec![Value::Int32(4), Value::Int32(5), Value::Int32(6)])
    );
    assert_eq!(container(data, "Values"), Container::List(vec![Value::Int32(1), Value::Int32(2)]));
    assert_eq!(container(data, "Words"), Container::List(vec![]));
}

#[test]
fn test_multi_dimensional_array() {
    let mut registry = TypeRegistry::new();
    registry.add_class(ClassDef::new("Grid").member(MemberDef::new("Cells", "i32[,]")));
    let mut ser = serializer(registry, "Grid");

    let cells = ArrayValue::from_parts(vec![2, 3], (1..=6).map(Value::Int32).collect()).unwrap();
    let grid = Value::from(
        Object::new("Grid").with("Cells", Object::with_container("i32[,]", Container::Array(cells.clone()))),
    );

    let doc = ser.serialize(&grid).unwrap();
    let node = doc.first_child(root(&doc), &XName::new("Cells")).unwrap();
    assert_eq!(doc.attribute(node, &crate::dimensions_attribute()), Some("2,3"));
    assert_eq!(doc.child_elements(node).count(), 6);

    let back = round_trip(&mut ser, &grid);
    let Container::Array(array) = container(&back, "Cells") else {
        panic!("expected an array");
    };
    assert_eq!(array, cells);
    assert_eq!(array.get(&[1, 2]), Some(&Value::Int32(6)));
}

#[test]
fn test_bad_array_dimensions_reported() {
    let mut registry = TypeRegistry::new();
    registry.add_class(ClassDef::new("Grid").member(MemberDef::new("Cells", "i32[,]")));
    let options = SerializerOptions::default().with_exception_policy(ExceptionPolicy::DoNotThrow);
    let mut ser = serializer(registry, "Grid").with_options(options);

    let value = ser
        .deserialize_from_str(
            r#"<Grid xmlns:veles="urn:veles:meta"><Cells veles:dims="4294967296,4294967296"/></Grid>"#,
        )
        .unwrap();
    let Container::Array(array) = container(value.as_object().unwrap(), "Cells") else {
        panic!("expected an array");
    };
    assert!(array.items().is_empty());
    assert_eq!(array.dims(), [0, 1]);
    let errors: Vec<&Error> = ser.parsing_errors().iter().map(|e| &e.error).collect();
    assert!(matches!(errors.as_slice(), [Error::BadlyFormedInput { member, .. }] if member == "Cells"));

    let value = ser
        .deserialize_from_str(
            r#"<Grid xmlns:veles="urn:veles:meta"><Cells veles:dims="2,2"><Int32>1</Int32><Int32>2</Int32><Int32>3</Int32></Cells></Grid>"#,
        )
        .unwrap();
    let Container::Array(array) = container(value.as_object().unwrap(), "Cells") else {
        panic!("expected an array");
    };
    assert_eq!(array.dims(), [3, 1]);
    assert_eq!(array.get(&[2, 0]), Some(&Value::Int32(3)));
    assert_eq!(ser.parsing_errors().len(), 1);
}

#[test]
fn test_stack_keeps_order() {
    let mut registry = TypeRegistry::new();
    registry.add_class(ClassDef::new("History").member(MemberDef::new("Undo", "Stack<i32>")));
    let mut ser = serializer(registry, "History");

    let stack = Container::Stack(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]);
    let history = Value::from(Object::new("History").with("Undo", Object::with_container("Stack<i32>", stack.clone())));

    let doc = ser.serialize(&history).unwrap();
    let undo = doc.first_child(root(&doc), &XName::new("Undo")).unwrap();
    let first = doc.child_elements(undo).next().unwrap();
    assert_eq!(doc.text(first), "3");

    let back = round_trip(&mut ser, &history);
    assert_eq!(container(&back, "Undo"), stack);
}

#[test]
fn test_dictionary_placements() {
    let mut registry = TypeRegistry::new();
    registry.add_class(
        ClassDef::new("Scores")
            .member(
                MemberDef::new("ByName", "Dictionary<string, i32>").dictionary(
                    DictionaryAttr::default()
                        .each_pair("Score")
                        .key("Name", Placement::Attribute)
                        .value("Points", Placement::Content),
                ),
            )
            .member(MemberDef::new("Plain", "Dictionary<i32, string>")),
    );
    let mut ser = serializer(registry, "Scores");

    let by_name = Container::Map(vec![("ann".into(), Value::Int32(3)), ("bob".into(), Value::Int32(5))]);
    let plain = Container::Map(vec![(Value::Int32(1), "one".into())]);
    let scores = Value::from(
        Object::new("Scores")
            .with("ByName", Object::with_container("Dictionary<string, i32>", by_name.clone()))
            .with("Plain", Object::with_container("Dictionary<i32, string>", plain.clone())),
    );

    let doc = ser.serialize(&scores).unwrap();
    let r = root(&doc);
    let node = doc.first_child(r, &XName::new("ByName")).unwrap();
    let first = doc.first_child(node, &XName::new("Score")).unwrap();
    assert_eq!(doc.attribute(first, &XName::new("Name")), Some("ann"));
    assert_eq!(doc.text(first), "3");

    let node = doc.first_child(r, &XName::new("Plain")).unwrap();
    let pair = doc.first_child(node, &XName::new("KeyValuePairOfInt32String")).unwrap();
    assert!(doc.first_child(pair, &XName::new("Key")).is_some());
    assert!(doc.first_child(pair, &XName::new("Value")).is_some());

    let back = round_trip(&mut ser, &scores);
    assert_eq!(container(&back, "ByName"), by_name);
    assert_eq!(container(&back, "Plain"), plain);
}

#[test]
fn test_duplicate_dictionary_key() {
    let mut registry = TypeRegistry::new();
    registry.add_class(ClassDef::new("Scores").member(MemberDef::new("Plain", "Dictionary<i32, string>")));
    let options = SerializerOptions::default().with_exception_policy(ExceptionPolicy::DoNotThrow);
    let mut ser = serializer(registry, "Scores").with_options(options);

    let xml = "<Scores><Plain>\
        <KeyValuePairOfInt32String><Key>1</Key><Value>a</Value></KeyValuePairOfInt32String>\
        <KeyValuePairOfInt32String><Key>1</Key><Value>b</Value></KeyValuePairOfInt32String>\
        </Plain></Scores>";
    let value = ser.deserialize_from_str(xml).unwrap();

    let plain = container(value.as_object().unwrap(), "Plain");
    assert_eq!(plain.entries().len(), 1);
    assert!(ser
        .parsing_errors()
        .iter()
        .any(|e| matches!(e.error, Error::CannotAddObjectToCollection { .. })));
}

#[test]
fn test_enum_aliases() {
    let mut registry = TypeRegistry::new();
    registry
        .add_enum(EnumDef::new("Color", ["Red", "Green"]).variant_alias("Red", "crimson"))
        .add_class(ClassDef::new("Paint").member(MemberDef::new("Color", "Color").attribute_for(".")));
    let mut ser = serializer(registry, "Paint");
    let paint = Value::from(Object::new("Paint").with("Color", EnumValue::new("Color", "Red")));

    let doc = ser.serialize(&paint).unwrap();
    assert_eq!(doc.attribute(root(&doc), &XName::new("Color")), Some("crimson"));

    let back = round_trip(&mut ser, &paint);
    assert_eq!(back.get("Color"), Some(Value::Enum(EnumValue::new("Color", "Red"))));

    let value = ser.deserialize_from_str(r#"<Paint Color="Green"/>"#).unwrap();
    let green = value.as_object().unwrap().get("Color");
    assert_eq!(green, Some(Value::Enum(EnumValue::new("Color", "Green"))));
}

/// Writes strings reversed.
struct Reversed;

impl CustomSerializer for Reversed {
    fn serialize_to_element(
        &self,
        value: &Value,
        doc: &mut XmlDocument,
        element: NodeId,
        ctx: &SerializationContext<'_>,
    ) -> veles_model::Result<()> {
        let text = self.serialize_to_value(value, ctx)?;
        doc.set_attribute(element, "rev", text);
        Ok(())
    }

    fn serialize_to_value(&self, value: &Value, _ctx: &SerializationContext<'_>) -> veles_model::Result<String> {
        Ok(value.as_str().unwrap_or_default().chars().rev().collect())
    }

    fn deserialize_from_element(
        &self,
        doc: &XmlDocument,
        element: NodeId,
        ctx: &SerializationContext<'_>,
    ) -> veles_model::Result<Value> {
        let text = doc.attribute(element, &XName::new("rev")).unwrap_or_default();
        self.deserialize_from_value(text, ctx)
    }

    fn deserialize_from_value(&self, text: &str, _ctx: &SerializationContext<'_>) -> veles_model::Result<Value> {
        Ok(Value::String(text.chars().rev().collect()))
    }
}

#[test]
fn test_custom_serializer() {
    let mut registry = TypeRegistry::new();
    registry.register_serializer("reversed", Arc::new(Reversed)).add_class(
        ClassDef::new("Secret")
            .member(MemberDef::new("Code", "string").custom_serializer("reversed").attribute_for("."))
            .member(MemberDef::new("Hint", "string").custom_serializer("reversed")),
    );
    let mut ser = serializer(registry, "Secret");
    let secret = Value::from(Object::new("Secret").with("Code", "abc").with("Hint", "xyz"));

    let doc = ser.serialize(&secret).unwrap();
    let r = root(&doc);
    assert_eq!(doc.attribute(r, &XName::new("Code")), Some("cba"));
    let hint = doc.first_child(r, &XName::new("Hint")).unwrap();
    assert_eq!(doc.attribute(hint, &XName::new("rev")), Some("zyx"));

    let back = round_trip(&mut ser, &secret);
    assert_eq!(back.get("Code"), Some(Value::from("abc")));
    assert_eq!(back.get("Hint"), Some(Value::from("xyz")));
}

#[test]
fn test_comments_and_namespaces() {
    let mut registry = TypeRegistry::new();
    registry.add_class(
        ClassDef::new("Settings")
            .comment("Application settings")
            .namespace(Some("s"), "urn:settings")
            .member(MemberDef::new("Theme", "string").comment("UI theme"))
            .member(MemberDef::new("Owner", "string").namespace(Some("o"), "urn:owner")),
    );
    let mut ser = serializer(registry, "Settings");
    let settings = Value::from(Object::new("Settings").with("Theme", "dark").with("Owner", "me"));

    let xml = ser.serialize_to_string(&settings).unwrap();
    assert!(xml.contains("<!-- Application settings -->"), "{}", xml);
    assert!(xml.contains("<!-- UI theme -->"), "{}", xml);
    assert!(xml.contains(r#"xmlns:s="urn:settings""#), "{}", xml);
    assert!(xml.contains(r#"xmlns:o="urn:owner""#), "{}", xml);
    assert!(xml.contains("<o:Owner>me</o:Owner>"), "{}", xml);

    let back = ser.deserialize_from_str(&xml).unwrap();
    let back = back.as_object().unwrap();
    assert_eq!(back.get("Theme"), Some(Value::from("dark")));
    assert_eq!(back.get("Owner"), Some(Value::from("me")));
}

fn window_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .add_class(
            ClassDef::new("Size")
                .member(MemberDef::new("Width", "i32").attribute_for("../Dimensions"))
                .member(MemberDef::new("Height", "i32").attribute_for("../Dimensions")),
        )
        .add_class(
            ClassDef::new("Window")
                .member(MemberDef::new("Title", "string").value_for("Caption"))
                .member(MemberDef::new("Size", "Size")),
        );
    registry
}

#[test]
fn test_relocated_members_recovered() {
    let mut ser = serializer(window_registry(), "Window");
    let window = Value::from(
        Object::new("Window")
            .with("Title", "Main")
            .with("Size", Object::new("Size").with("Width", 640).with("Height", 480)),
    );

    let doc = ser.serialize(&window).unwrap();
    let r = root(&doc);
    assert!(doc.first_child(r, &XName::new("Size")).is_none());
    let dims = doc.first_child(r, &XName::new("Dimensions")).unwrap();
    assert_eq!(doc.attribute(dims, &XName::new("Width")), Some("640"));
    let caption = doc.first_child(r, &XName::new("Caption")).unwrap();
    assert_eq!(doc.text(caption), "Main");

    let back = ser.deserialize(&doc).unwrap();
    let back = back.as_object().unwrap();
    assert_eq!(back.get("Title"), Some(Value::from("Main")));
    let size = back.get("Size").unwrap();
    let size = size.as_object().unwrap();
    assert_eq!(size.get("Width"), Some(Value::Int32(640)));
    assert_eq!(size.get("Height"), Some(Value::Int32(480)));
    assert!(ser.parsing_errors().is_empty());
}

#[test]
fn test_deserialize_into_existing() {
    let mut registry = TypeRegistry::new();
    registry.add_class(
        ClassDef::new("Profile")
            .member(MemberDef::new("Name", "string"))
            .member(MemberDef::new("Bio", "string").error_if_missed(Severity::Ignore, None)),
    );
    let mut ser = serializer(registry, "Profile");
    let existing = Object::new("Profile").with("Name", "old").with("Bio", "kept").into_ref();

    let doc = XmlDocument::parse("<Profile><Name>new</Name></Profile>").unwrap();
    let value = ser.deserialize_into(&doc, &existing).unwrap();

    assert!(value.as_object().unwrap().ptr_eq(&existing));
    assert_eq!(existing.get("Name"), Some(Value::from("new")));
    assert_eq!(existing.get("Bio"), Some(Value::from("kept")));
}

#[test]
fn test_known_types() {
    let mut registry = TypeRegistry::new();
    registry.add_class(
        ClassDef::new("Record")
            .member(MemberDef::new("Id", "Guid").attribute_for("."))
            .member(MemberDef::new("Created", "DateTime"))
            .member(MemberDef::new("Elapsed", "TimeSpan")),
    );
    let mut ser = serializer(registry, "Record");

    let id = Guid::from_bytes([0x12; 16]);
    let created = DateTime::parse_from_rfc3339("2024-05-01T12:30:00+02:00").unwrap();
    let record = Value::from(
        Object::new("Record")
            .with("Id", id)
            .with("Created", Value::DateTime(created))
            .with("Elapsed", Value::TimeSpan(TimeDelta::seconds(90))),
    );

    let doc = ser.serialize(&record).unwrap();
    let r = root(&doc);
    assert_eq!(doc.attribute(r, &XName::new("Id")), Some(id.to_string().as_str()));
    let elapsed = doc.first_child(r, &XName::new("Elapsed")).unwrap();
    assert_eq!(doc.text(elapsed), "00:01:30");

    let back = round_trip(&mut ser, &record);
    assert_eq!(back.get("Id"), Some(Value::Guid(id)));
    assert_eq!(back.get("Created"), Some(Value::DateTime(created)));
    assert_eq!(back.get("Elapsed"), Some(Value::TimeSpan(TimeDelta::seconds(90))));
}

#[test]
fn test_text_embeddings() {
    let mut registry = TypeRegistry::new();
    registry.add_class(
        ClassDef::new("Note")
            .member(MemberDef::new("Body", "string").embed(TextEmbedding::CData))
            .member(MemberDef::new("Key", "string").attribute_for(".").embed(TextEmbedding::Base64)),
    );
    let mut ser = serializer(registry, "Note");
    let note = Value::from(Object::new("Note").with("Body", "<b>bold</b>").with("Key", "hello"));

    let doc = ser.serialize(&note).unwrap();
    let r = root(&doc);
    assert_eq!(doc.attribute(r, &XName::new("Key")), Some("aGVsbG8="));
    let body = doc.first_child(r, &XName::new("Body")).unwrap();
    assert!(doc.has_cdata(body));

    let back = round_trip(&mut ser, &note);
    assert_eq!(back.get("Body"), Some(Value::from("<b>bold</b>")));
    assert_eq!(back.get("Key"), Some(Value::from("hello")));
}

#[test]
fn test_collection_subclass_members() {
    let mut registry = TypeRegistry::new();
    registry
        .add_class(
            ClassDef::new("Playlist")
                .extends("List<string>")
                .member(MemberDef::new("Title", "string").attribute_for(".")),
        )
        .add_class(ClassDef::new("Library").member(MemberDef::new("Favorites", "Playlist")));
    let mut ser = serializer(registry, "Library");

    let playlist = Object::with_container("Playlist", Container::List(vec!["one".into(), "two".into()]))
        .with("Title", "best");
    let library = Value::from(Object::new("Library").with("Favorites", playlist));

    let back = round_trip(&mut ser, &library);
    let favorites = back.get("Favorites").unwrap();
    let favorites = favorites.as_object().unwrap();
    assert_eq!(favorites.get("Title"), Some(Value::from("best")));
    assert_eq!(
        favorites.read().container,
        Some(Container::List(vec!["one".into(), "two".into()]))
    );
}

#[test]
fn test_recursion_limit() {
    let options = SerializerOptions::default().with_max_recursion(2);
    let mut ser = serializer(node_registry(), "Node").with_options(options);
    let third = Object::new("Node").with("Name", "c");
    let second = Object::new("Node").with("Name", "b").with("Next", third);
    let first = Value::from(Object::new("Node").with("Name", "a").with("Next", second));

    let doc = ser.serialize(&first).unwrap();
    let second = doc.first_child(root(&doc), &XName::new("Next")).unwrap();
    let third = doc.first_child(second, &XName::new("Next")).unwrap();
    assert!(doc.is_empty_element(third));
}

#[test]
fn test_file_round_trip() {
    let path = std::env::temp_dir().join(format!("veles-bind-test-{}.xml", std::process::id()));
    let mut ser = serializer(person_registry(), "Person");
    let person = Value::from(Object::new("Person").with("Name", "File").with("Age", 9));

    ser.serialize_to_file(&person, &path).unwrap();
    let back = ser.deserialize_from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(back.as_object().unwrap().get("Age"), Some(Value::Int32(9)));
}
