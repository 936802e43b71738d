/// Builds a [`Zero`] from `name: Kind` pairs.
///
/// ```
/// use relalg::zero;
/// let shape = zero! { SNO: Int, SName: Text, Status: Int, City: Text };
/// assert_eq!(4, shape.degree());
/// ```
///
/// Panics on an illegal attribute name or a duplicate attribute; shape
/// literals are part of the program text, not data.
///
/// [`Zero`]: crate::Zero
#[macro_export]
macro_rules! zero {
    ($($name:ident : $kind:ident),* $(,)?) => {
        $crate::Zero::new(vec![
            $((
                $crate::Attribute::new(stringify!($name)).expect("legal attribute name"),
                $crate::Value::zero_of($crate::Kind::$kind),
            )),*
        ])
        .expect("distinct attribute names")
    };
}

/// Builds a [`Tuple`] from values convertible to [`Value`].
///
/// ```
/// use relalg::tup;
/// let smith = tup!(1, "Smith", 20, "London");
/// ```
///
/// Panics on a NaN float literal; tuple literals are part of the program
/// text, not data. Runtime float conversions go through `TryFrom<f64>` on
/// [`Value`], which reports the failure instead.
///
/// [`Tuple`]: crate::Tuple
/// [`Value`]: crate::Value
#[macro_export]
macro_rules! tup {
    ($($value:expr),* $(,)?) => {
        $crate::Tuple::from(vec![$($crate::Value::literal($value)),*])
    };
}

/// Builds a candidate-key list from bracketed attribute groups.
///
/// ```
/// use relalg::keys;
/// let ck = keys![[PNO, SNO]];
/// let none: relalg::CandKeys = keys![];
/// ```
#[macro_export]
macro_rules! keys {
    ($([$($attr:ident),* $(,)?]),* $(,)?) => {
        vec![$(
            vec![$($crate::Attribute::new(stringify!($attr)).expect("legal attribute name")),*]
        ),*]
    };
}
