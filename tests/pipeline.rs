//! End-to-end checks of the format → model → parse pipeline
//!
//! Everything here runs against `DummyLM`, so no network is involved.

use serde_json::json;
use sigil::prelude::*;
use sigil::{formatter, MemoryTelemetry, Role};
use std::sync::Arc;

const FOUR: &str = "[[ ## answer ## ]]\n4\n\n[[ ## completed ## ]]";

#[test]
fn test_question_answer_format() {
    let signature = signature!("question -> answer");
    let messages = ChatAdapter::new()
        .format(&signature, &[], &inputs! { "question" => "What is 2+2?" })
        .unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[1].role, Role::User);

    let system = &messages[0].content;
    assert!(system.contains("1. `question` (string)"));
    assert!(system.contains("1. `answer` (string)"));
    assert!(system.contains("All interactions will be structured in the following way"));
    assert!(system.contains("[[ ## question ## ]]\n{question}\n\n[[ ## answer ## ]]\n{answer}"));

    let user = &messages[1].content;
    assert!(user.starts_with("[[ ## question ## ]]\nWhat is 2+2?"));
    assert!(user.contains("`[[ ## answer ## ]]`"));
    assert!(user.ends_with("`[[ ## completed ## ]]`."));
}

#[test]
fn test_answer_marker_parse() {
    let parsed = ChatAdapter::new()
        .parse(&signature!("question -> answer"), FOUR)
        .unwrap();
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed["answer"], "4");
}

#[test]
fn test_prepended_reasoning_comes_first() {
    let base = signature!("question -> answer");
    let derived = base
        .prepend("reasoning", FieldType::String, "Think step by step.")
        .unwrap();

    assert_eq!(derived.output_names().collect::<Vec<_>>(), ["reasoning", "answer"]);
    // the original is untouched
    assert_eq!(base.output_names().collect::<Vec<_>>(), ["answer"]);

    let messages = ChatAdapter::new()
        .format(&derived, &[], &inputs! { "question" => "q" })
        .unwrap();
    let system = &messages[0].content;
    let template = &system[system.find("All interactions").unwrap()..];
    assert!(template.find("[[ ## reasoning ## ]]").unwrap() < template.find("[[ ## answer ## ]]").unwrap());

    let request = formatter::output_request(&derived);
    assert!(request.find("`[[ ## reasoning ## ]]`").unwrap() < request.find("`[[ ## answer ## ]]`").unwrap());
    assert!(messages[1].content.ends_with(&request));
}

#[test]
fn test_format_is_deterministic() {
    let signature = signature!("context, question -> reasoning, answer", "Answer briefly.");
    let demos = vec![demo! {
        "answer" => "Paris",
        "context" => "France",
        "question" => "Capital?",
        "reasoning" => "Known fact.",
    }];
    let inputs = inputs! { "context" => "Italy", "question" => "Capital?" };

    for adapter in [&ChatAdapter::new() as &dyn Adapter, &JsonAdapter::new()] {
        let first = adapter.format(&signature, &demos, &inputs).unwrap();
        let second = adapter.format(&signature, &demos, &inputs).unwrap();
        assert_eq!(first, second, "{} adapter is not deterministic", adapter.name());
    }
}

#[test]
fn test_demo_outputs_follow_declared_order() {
    let signature = signature!("question -> a, b");
    let demos = vec![demo! { "b" => "second", "question" => "q", "a" => "first" }];
    let messages = ChatAdapter::new()
        .format(&signature, &demos, &inputs! { "question" => "next" })
        .unwrap();

    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(
        messages[2].content,
        "[[ ## a ## ]]\nfirst\n\n[[ ## b ## ]]\nsecond\n\n[[ ## completed ## ]]"
    );
}

#[test]
fn test_rendered_values_parse_back() {
    let signature = signature!("question -> reasoning, answer, confidence");
    let values = [
        ("reasoning", "Two plus two.\n```\n2 + 2 = 4\n```"),
        ("answer", "4"),
        ("confidence", "high, see the block closed with ```"),
    ];

    let mut raw = String::from("Sure, here you go:\n\n");
    for (name, value) in values {
        raw.push_str(&format!("{}\n{}\n\n", formatter::field_marker(name), value));
    }
    raw.push_str(&formatter::completed_marker());

    let parsed = ChatAdapter::new().parse(&signature, &raw).unwrap();
    for (name, value) in values {
        assert_eq!(parsed[name], value);
    }
}

#[test]
fn test_first_missing_marker_is_reported() {
    let signature = signature!("question -> reasoning, answer, confidence");
    let raw = "[[ ## reasoning ## ]]\nhmm\n\n[[ ## confidence ## ]]\nlow\n\n[[ ## completed ## ]]";
    let result = ChatAdapter::new().parse(&signature, raw);
    assert!(matches!(result, Err(PredictError::FieldNotFound(name)) if name == "answer"));
}

#[test]
fn test_input_set_must_match_signature() {
    let signature = signature!("context, question -> answer");
    let adapter = ChatAdapter::new();

    let missing = adapter.format(&signature, &[], &inputs! { "question" => "q" });
    assert!(matches!(missing, Err(PredictError::MissingInputField(name)) if name == "context"));

    let unexpected = adapter.format(
        &signature,
        &[],
        &inputs! { "context" => "c", "question" => "q", "hint" => "h" },
    );
    assert!(matches!(unexpected, Err(PredictError::UnexpectedInputField(name)) if name == "hint"));
}

#[test]
fn test_duplicate_fields_are_rejected() {
    let signature = signature!("question -> answer");
    assert!(matches!(
        signature.prepend("question", FieldType::String, ""),
        Err(PredictError::DuplicateField(name)) if name == "question"
    ));
    assert!(matches!(
        signature.append("answer", FieldType::Number, ""),
        Err(PredictError::DuplicateField(_))
    ));
    assert!("a, a -> b".parse::<Signature>().is_err());
}

#[tokio::test]
async fn test_trace_accumulates_in_call_order() {
    let lm = Arc::new(DummyLM::new("dummy"));
    for n in 0..3 {
        lm.push_response(format!("[[ ## answer ## ]]\n{n}\n\n[[ ## completed ## ]]"));
    }
    lm.push_response("no markers at all");
    lm.push_response(FOUR);

    let telemetry = Arc::new(MemoryTelemetry::new());
    let settings = Settings::new()
        .with_lm_ref(lm.clone())
        .with_telemetry(telemetry.clone());
    let predict = Predict::with_id("qa", signature!("question -> answer"));

    for n in 0..3 {
        predict
            .invoke(&settings, inputs! { "question" => n }, CallOverrides::new())
            .await
            .unwrap();
    }
    assert_eq!(predict.trace().len(), 3);

    let failed = predict
        .invoke(&settings, inputs! { "question" => 3 }, CallOverrides::new())
        .await;
    assert!(matches!(failed, Err(PredictError::FieldNotFound(_))));
    assert_eq!(predict.trace().len(), 3);

    predict
        .invoke(&settings, inputs! { "question" => 4 }, CallOverrides::new())
        .await
        .unwrap();

    let trace = predict.trace();
    let answers: Vec<&str> = trace.iter().filter_map(|e| e.outputs.get("answer")).collect();
    assert_eq!(answers, ["0", "1", "2", "4"]);
    assert_eq!(telemetry.get_traces(), trace);

    let exported = predict.trace_log().export_jsonl().unwrap();
    let lines: Vec<serde_json::Value> = exported
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[3]["predictor"], "qa");
    assert_eq!(lines[3]["inputs"]["question"], json!(4));
}

#[tokio::test]
async fn test_optimizer_sees_units_through_capabilities() {
    let lm = Arc::new(DummyLM::new("dummy").with_fallback(FOUR));
    let settings = Settings::new().with_lm_ref(lm.clone());
    let qa = Arc::new(Predict::with_id("qa", signature!("question -> answer")));

    let mut registry = ParameterRegistry::new();
    registry.register(qa.clone());

    let unit: Arc<dyn Invocable> = qa.clone();
    unit.invoke(&settings, inputs! { "question" => "2+2?" }, CallOverrides::new())
        .await
        .unwrap();

    let holder = registry.get("qa").unwrap();
    let demos: Vec<Demo> = holder
        .trace()
        .iter()
        .map(|entry| {
            let mut demo = Demo::from(entry.inputs.clone());
            for (name, value) in entry.outputs.fields() {
                demo.insert(name.clone(), value.clone());
            }
            demo
        })
        .collect();
    holder.set_demos(demos);

    unit.invoke(&settings, inputs! { "question" => "3+1?" }, CallOverrides::new())
        .await
        .unwrap();

    let calls = lm.calls();
    assert_eq!(calls[1].messages.len(), 4);
    assert_eq!(calls[1].messages[1].content, "[[ ## question ## ]]\n2+2?");
    assert_eq!(qa.trace()[1].parameters.demos.len(), 1);
}

#[tokio::test]
async fn test_typed_outputs_coerce() {
    let signature = Signature::new()
        .input("question", "")
        .unwrap()
        .typed_output("answer", FieldType::Integer, "")
        .unwrap()
        .typed_output("sure", FieldType::Boolean, "")
        .unwrap();
    let lm = DummyLM::new("dummy")
        .with_fallback("[[ ## answer ## ]]\n42\n\n[[ ## sure ## ]]\nyes\n\n[[ ## completed ## ]]");
    let settings = Settings::new().with_lm(lm);

    let prediction = Predict::new(signature.clone())
        .invoke(&settings, inputs! { "question" => "q" }, CallOverrides::new())
        .await
        .unwrap();

    let typed = prediction.coerce(&signature).unwrap();
    assert_eq!(typed["answer"], json!(42));
    assert_eq!(typed["sure"], json!(true));
    assert_eq!(prediction.get_as::<i64>("answer").unwrap(), 42);
}
