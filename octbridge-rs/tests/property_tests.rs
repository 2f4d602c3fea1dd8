use proptest::prelude::*;

use octbridge::interp::parse;
use octbridge::{HostValue, NdArray, Octave};

proptest! {
    /// The parser returns Ok or Err on arbitrary text but never panics.
    #[test]
    fn parser_does_not_panic(s in "\\PC*") {
        let result = std::panic::catch_unwind(|| {
            let _ = parse(&s);
        });
        prop_assert!(result.is_ok());
    }
}

proptest! {
    /// Doubles keep their values and shape through a variable.
    #[test]
    fn double_arrays_survive_a_variable(
        rows in 0usize..4,
        cols in 0usize..4,
        seed in prop::collection::vec(-1.0e6f64..1.0e6, 16),
    ) {
        let data: Vec<f64> = seed.into_iter().take(rows * cols).collect();
        let a = NdArray::new(&[rows, cols], data).unwrap();
        let mut oct = Octave::new();
        oct.locals().set("a", HostValue::Array(a.clone())).unwrap();
        let back = oct.locals().get("a").unwrap();
        prop_assert_eq!(back, HostValue::Array(a));
    }
}

proptest! {
    /// Integer arrays keep their class, shape and every element.
    #[test]
    fn int32_arrays_survive_a_variable(xs in prop::collection::vec(any::<i32>(), 2..12)) {
        let a = NdArray::column(xs);
        let mut oct = Octave::new();
        oct.locals().set("a", HostValue::Array(a.clone())).unwrap();
        let class = oct.eval(1, "class(a)").unwrap();
        prop_assert_eq!(class[0].as_text(), Some("int32"));
        prop_assert_eq!(oct.locals().get("a").unwrap(), HostValue::Array(a));
    }
}
