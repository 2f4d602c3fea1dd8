//! End-to-end behaviour of the bridge: values in, values out, scopes and
//! faults, driven only through the public API.

use std::fs::File;
use std::time::{Duration, SystemTime};

use octbridge::scope::local_callback;
use octbridge::{
    BridgeError, Complex32, Complex64, ErrorKind, HostDict, HostValue, NdArray, Number, Octave,
};
use pretty_assertions::assert_eq;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn scalar(v: &HostValue) -> f64 {
    v.as_f64().unwrap_or_else(|| panic!("not a real scalar: {v}"))
}

fn eval1(oct: &mut Octave, code: &str) -> HostValue {
    oct.eval(1, code).unwrap_or_else(|e| panic!("{code}: {e}")).remove(0)
}

fn is_equal(oct: &mut Octave, a: &HostValue, b: &HostValue) -> bool {
    let out = oct.feval(1, "isequal", &[a.clone(), b.clone()]).unwrap();
    scalar(&out[0]) != 0.0
}

// ── Marshalling ───────────────────────────────────────────────────────────────

#[test]
fn typed_arrays_round_trip_through_variables() {
    let mut oct = Octave::new();
    let arrays = [
        NdArray::new(&[2, 3], vec![i8::MIN, -1, 0, 1, 2, i8::MAX]).unwrap(),
        NdArray::new(&[1, 4], vec![0u16, 1, 2, u16::MAX]).unwrap(),
        NdArray::new(&[3, 1], vec![i64::MIN, 0, i64::MAX]).unwrap(),
        NdArray::new(&[2, 2, 2], vec![0.5f32, 1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5]).unwrap(),
        NdArray::new(&[1, 3], vec![true, false, true]).unwrap(),
    ];
    for a in arrays {
        let host = HostValue::Array(a.clone());
        oct.locals().set("v", host.clone()).unwrap();
        assert_eq!(oct.locals().get("v").unwrap(), host);
        assert!(is_equal(&mut oct, &host, &host));
        let class = eval1(&mut oct, "class(v)");
        assert_eq!(class.as_text(), Some(a.elem_type().class_name()));
    }
}

#[test]
fn row_and_column_vectors_keep_orientation() {
    let mut oct = Octave::new();
    let row = eval1(&mut oct, "[1, 1, 1]");
    assert_eq!(row.as_array().map(|a| a.shape().to_vec()), Some(vec![1, 3]));
    let col = eval1(&mut oct, "[1; 2; 3]");
    assert_eq!(col.as_array().map(|a| a.shape().to_vec()), Some(vec![3, 1]));
}

#[test]
fn empty_arrays_are_distinct_and_never_equal_elementwise() {
    let mut oct = Octave::new();
    for (code, shape) in [("zeros(0, 0)", [0, 0]), ("zeros(0, 1)", [0, 1]), ("zeros(1, 0)", [1, 0])] {
        let v = eval1(&mut oct, code);
        assert_eq!(v.as_array().map(|a| a.shape().to_vec()), Some(shape.to_vec()), "{code}");
    }
    oct.locals().set("e", HostValue::Array(NdArray::new(&[0, 0], Vec::<f64>::new()).unwrap())).unwrap();
    let out = eval1(&mut oct, "if e == e\n  r = 1;\nelseif e != e\n  r = 2;\nelse\n  r = 3;\nend\nr");
    assert_eq!(scalar(&out), 3.0);
    assert_eq!(scalar(&eval1(&mut oct, "isempty(e == e)")), 1.0);
}

#[test]
fn integer_saturation_happens_in_the_interpreter() {
    let mut oct = Octave::new();
    let v = eval1(&mut oct, "int8(200)");
    assert_eq!(v, HostValue::Array(NdArray::scalar(Number::Int8(127))));
    assert_eq!(scalar(&eval1(&mut oct, "uint8(3) - uint8(5)")), 0.0);
    assert_eq!(scalar(&eval1(&mut oct, "int16(100) * 400")), 32767.0);
    // The marshaller itself never clamps.
    oct.locals().set("big", HostValue::Int(1 << 40)).unwrap();
    assert_eq!(scalar(&eval1(&mut oct, "big")), (1u64 << 40) as f64);
}

#[test]
fn lists_and_dicts() {
    let mut oct = Octave::new();
    oct.locals().set("xs", HostValue::list([1.0, 2.0])).unwrap();
    assert_eq!(eval1(&mut oct, "class(xs)").as_text(), Some("double"));

    let mixed = HostValue::List(vec![1.into(), "two".into()]);
    oct.locals().set("c", mixed).unwrap();
    assert_eq!(eval1(&mut oct, "class(c)").as_text(), Some("cell"));
    assert_eq!(eval1(&mut oct, "c{2}").as_text(), Some("two"));

    let dict: HostDict = [("foo", 1), ("bar", 2)].into_iter().collect();
    oct.locals().set("s", dict).unwrap();
    assert_eq!(scalar(&eval1(&mut oct, "s.foo + s.bar")), 3.0);
    let back = oct.locals().get("s").unwrap();
    assert_eq!(back.as_dict().map(HostDict::len), Some(2));
}

#[test]
fn key_faults_differ_by_layer() {
    let mut oct = Octave::new();
    let float_key: HostDict = [(1.22, 1)].into_iter().collect();
    let e = oct.locals().set("d", float_key).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ObjectConvert);
    let e = oct.locals().set_item(&HostValue::Float(1.22), 1).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Type);
    let e = oct.locals().set_item(&"not an identifier".into(), 1).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::VarName);
}

#[test]
fn unconvertible_results_fail_the_whole_call() {
    let mut oct = Octave::new();
    assert_eq!(oct.eval(1, "@sin").unwrap_err().kind(), ErrorKind::ValueConvert);
    assert_eq!(oct.eval(2, "deal(1, @sin)").unwrap_err().kind(), ErrorKind::ValueConvert);
    assert_eq!(oct.eval(1, "cell(2, 2)").unwrap_err().kind(), ErrorKind::ValueConvert);
    for code in ["cell(1, 3)", "cell(1, 0)", "cell(0, 0)", "cell(3, 1)", "cell(0, 1)"] {
        assert!(oct.eval(1, code).is_ok(), "{code}");
    }
}

#[test]
fn arguments_convert_all_or_nothing() {
    let mut oct = Octave::new();
    let e = oct.feval(0, "disp", &[1.into(), HostValue::None]).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ObjectConvert);
    assert_eq!(oct.take_output(), "");
}

#[test]
fn integer_limits_survive_every_width() {
    let mut oct = Octave::new();
    let arrays = [
        NdArray::new(&[1, 2], vec![i8::MIN, i8::MAX]).unwrap(),
        NdArray::new(&[1, 2], vec![i16::MIN, i16::MAX]).unwrap(),
        NdArray::new(&[1, 2], vec![i32::MIN, i32::MAX]).unwrap(),
        NdArray::new(&[1, 2], vec![i64::MIN, i64::MAX]).unwrap(),
        NdArray::new(&[1, 2], vec![u8::MIN, u8::MAX]).unwrap(),
        NdArray::new(&[1, 2], vec![u16::MIN, u16::MAX]).unwrap(),
        NdArray::new(&[1, 2], vec![u32::MIN, u32::MAX]).unwrap(),
        NdArray::new(&[1, 2], vec![u64::MIN, u64::MAX]).unwrap(),
    ];
    for a in arrays {
        let class = a.elem_type().class_name();
        let host = HostValue::Array(a);
        oct.locals().set("v", host.clone()).unwrap();
        assert_eq!(oct.locals().get("v").unwrap(), host, "{class}");
        assert!(is_equal(&mut oct, &host, &host), "{class}");
        assert_eq!(eval1(&mut oct, "class(v)").as_text(), Some(class));
        let limits = format!("isequal(v, [intmin('{class}'), intmax('{class}')])");
        assert_eq!(scalar(&eval1(&mut oct, &limits)), 1.0, "{class}");
    }
}

#[test]
fn complex_arrays_keep_their_precision() {
    let mut oct = Octave::new();
    let double = NdArray::new(
        &[1, 2],
        vec![Complex64::new(1.0, -2.0), Complex64::new(0.5, 3.25)],
    )
    .unwrap();
    let single = NdArray::new(
        &[2, 1],
        vec![Complex32::new(1.5, 2.0), Complex32::new(-4.0, 0.25)],
    )
    .unwrap();
    for (a, class) in [(double, "double"), (single, "single")] {
        let host = HostValue::Array(a);
        oct.locals().set("z", host.clone()).unwrap();
        assert_eq!(oct.locals().get("z").unwrap(), host);
        assert!(is_equal(&mut oct, &host, &host));
        assert_eq!(eval1(&mut oct, "class(z)").as_text(), Some(class));
        assert_eq!(scalar(&eval1(&mut oct, "iscomplex(z)")), 1.0);
    }
}

#[test]
fn text_valued_dicts_do_not_bind() {
    let mut oct = Octave::new();
    let dict: HostDict = [("asdf", "asdf")].into_iter().collect();
    let e = oct.feval(1, "sin", &[dict.into()]).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ObjectConvert);

    let back = eval1(&mut oct, "struct('name', 'bob')");
    let fields = back.as_dict().expect("struct reads back as a dict");
    assert_eq!(fields.get_str("name").and_then(HostValue::as_text), Some("bob"));
    let e = oct.locals().set("s", back).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ObjectConvert);
    assert!(!oct.locals().contains("s"));

    let wrapped: HostDict = [("name", HostValue::list(["bob"]))].into_iter().collect();
    oct.locals().set("s", wrapped).unwrap();
    assert_eq!(eval1(&mut oct, "class(s.name)").as_text(), Some("cell"));
    assert_eq!(eval1(&mut oct, "s.name{1}").as_text(), Some("bob"));
}

#[test]
fn empty_char_arrays_keep_their_shape() {
    let mut oct = Octave::new();
    assert_eq!(eval1(&mut oct, "''").as_text(), Some(""));
    for (code, shape) in [("char(zeros(1, 0))", [1, 0]), ("char(zeros(0, 3))", [0, 3])] {
        let v = eval1(&mut oct, code);
        let a = v.as_array().unwrap_or_else(|| panic!("{code} read as {v}"));
        assert_eq!(a.shape(), shape);
        oct.locals().set("c", v.clone()).unwrap();
        assert_eq!(eval1(&mut oct, "class(c)").as_text(), Some("char"));
        assert_eq!(oct.locals().get("c").unwrap(), v);
    }
}

#[test]
fn oversized_arrays_raise_interpreter_errors() {
    let mut oct = Octave::new();
    for code in [
        "zeros(1e10, 1e10)",
        "ones(1e10)",
        "cell(1e6, 1e6)",
        "repmat({1, 'x'}, 1e10, 1e10)",
        "repmat([1 2], 1e19)",
        "reshape(1:4, 1e10, 1e10, [])",
        "reshape(1:4, [1e10 1e10])",
        "x = []; x(1e18) = 1;",
        "y = 1; y(1e6, 1e6) = 2;",
        "linspace(0, 1, 1e12)",
        "1:1e12",
    ] {
        let e = oct.eval(0, code).unwrap_err();
        assert_eq!(e.identifier(), Some("Octave:out-of-memory"), "{code}: {e}");
    }
    assert_eq!(oct.frame_depth(), 1);
    assert_eq!(scalar(&eval1(&mut oct, "numel(zeros(0, 1e12))")), 0.0);
}

// ── Scopes ────────────────────────────────────────────────────────────────────

#[test]
fn local_and_global_tables_are_separate() {
    let mut oct = Octave::new();
    oct.locals().set("localvariable", 1).unwrap();
    assert!(!oct.globals().contains("localvariable"));
    oct.locals().delete("localvariable").unwrap();
    assert_eq!(oct.locals().get("localvariable").unwrap_err().kind(), ErrorKind::KeyNotFound);

    oct.globals().set("globalvariable", 1).unwrap();
    assert!(!oct.locals().contains("globalvariable"));
    oct.globals().delete("globalvariable").unwrap();
    assert_eq!(oct.globals().delete("globalvariable").unwrap_err().kind(), ErrorKind::KeyNotFound);
}

#[test]
fn declared_globals_are_shared() {
    let mut oct = Octave::new();
    oct.eval(0, "global counter; counter = 3;").unwrap();
    assert_eq!(scalar(&oct.globals().get("counter").unwrap()), 3.0);
    assert!(oct.locals().contains("counter"));
    oct.eval(0, "function bump()\n  global counter\n  counter = counter + 1;\nend\n").unwrap();
    oct.feval(0, "bump", &[]).unwrap();
    assert_eq!(scalar(&oct.locals().get("counter").unwrap()), 4.0);
}

#[test]
fn recursive_callbacks_get_their_own_frames() {
    let mut oct = Octave::new();
    oct.register_function(
        "sloppy_factorial",
        local_callback(|oct, args| {
            oct.locals().set("x", args[0].clone())?;
            let xm1 = scalar(&oct.eval(1, "x - 1")?[0]);
            let fxm1 = if xm1 > 0.0 {
                oct.feval(1, "sloppy_factorial", &[xm1.into()])?.remove(0)
            } else {
                HostValue::Float(1.0)
            };
            oct.locals().set("fxm1", fxm1)?;
            oct.eval(1, "x * fxm1")
        }),
    )
    .unwrap();

    let out = oct.feval(1, "sloppy_factorial", &[5.into()]).unwrap();
    assert_eq!(scalar(&out[0]), 120.0);
    assert_eq!(oct.frame_depth(), 1);
    assert!(!oct.locals().contains("fxm1"));

    // Interpreter code can drive the same callback.
    assert_eq!(scalar(&eval1(&mut oct, "sloppy_factorial(4)")), 24.0);
}

#[test]
fn callback_faults_reach_interpreter_handlers() {
    let mut oct = Octave::new();
    oct.register_function("strict", |oct, args| {
        if args.is_empty() {
            return Err(BridgeError::VarName("???".into()));
        }
        oct.eval(1, "error('mine:bad', 'rejected')")
    })
    .unwrap();
    let out = eval1(
        &mut oct,
        "try\n  strict();\ncatch e\n  msg = e.identifier;\nend\nmsg",
    );
    assert_eq!(out.as_text(), Some("octbridge:host-error"));
    let out = eval1(&mut oct, "try\n  strict(1);\ncatch e\n  msg = e.identifier;\nend\nmsg");
    assert_eq!(out.as_text(), Some("mine:bad"));
    let e = oct.eval(0, "strict(1)").unwrap_err();
    assert_eq!(e.identifier(), Some("mine:bad"));
    assert_eq!(oct.frame_depth(), 1);
}

// ── Functions ─────────────────────────────────────────────────────────────────

#[test]
fn eval_defined_functions_are_callable() {
    let mut oct = Octave::new();
    oct.eval(
        0,
        "function [s, p] = sum_prod(a, b)\n  s = a + b;\n  p = a * b;\nendfunction\n",
    )
    .unwrap();
    let out = oct.feval(2, "sum_prod", &[3.into(), 4.into()]).unwrap();
    assert_eq!((scalar(&out[0]), scalar(&out[1])), (7.0, 12.0));
    let e = oct.feval(3, "sum_prod", &[3.into(), 4.into()]).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Octave);
}

#[test]
fn load_path_files_reload_when_changed() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("answer.m");
    std::fs::write(&file, "function r = answer()\n  r = 1;\nend\n").unwrap();

    let mut oct = Octave::new();
    oct.add_path(dir.path());
    assert_eq!(scalar(&eval1(&mut oct, "answer()")), 1.0);

    std::fs::write(&file, "function r = answer()\n  r = 42;\nend\n").unwrap();
    let later = SystemTime::now() + Duration::from_secs(10);
    File::options().write(true).open(&file).unwrap().set_modified(later).unwrap();
    assert_eq!(scalar(&eval1(&mut oct, "answer()")), 42.0);
    assert_eq!(scalar(&eval1(&mut oct, "exist('answer')")), 2.0);
}

#[test]
fn parse_errors_report_position() {
    let mut oct = Octave::new();
    match oct.eval(1, "x = 1;\ny = [1, 2;\nendfunction") {
        Err(BridgeError::Parse(p)) => assert!(p.line >= 2, "{p}"),
        other => panic!("expected a parse fault, got {other:?}"),
    }
    assert_eq!(oct.eval(1, "endfunction").unwrap_err().kind(), ErrorKind::Parse);
}
