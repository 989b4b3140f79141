/// Build an [`Avs`](crate::Avs) of symbol values through a
/// [`ProjectBuilder`](crate::ProjectBuilder), interning every name.
///
/// ```
/// use allomorph::{ProjectBuilder, avs};
///
/// let mut b = ProjectBuilder::new();
/// let value = avs!(b, class: noun, case: nominative);
/// assert_eq!(value.len(), 2);
/// ```
#[macro_export]
macro_rules! avs {
    ($builder:expr $(, $attr:ident : $value:ident)* $(,)?) => {
        $builder.avs(&[ $((stringify!($attr), stringify!($value))),* ])
    };
}

/// Declare an [`AllomorphRule`](crate::AllomorphRule).
///
/// ```ignore
/// allomorph_rule! {
///     name: "inessive",
///     tag: suffix,
///     program: [AllomorphOp::literal("ssa"), AllomorphOp::assign(case, Value::Symbol(inessive))],
/// }
/// ```
#[macro_export]
macro_rules! allomorph_rule {
    (
        name: $name:expr
        $(, tag: $tag:expr)?
        , program: [ $($op:expr),* $(,)? ]
        $(,)?
    ) => {{
        $crate::AllomorphRule {
            name: ($name).to_string(),
            tag: None $(.or(Some($tag)))?,
            program: vec![ $($op),* ],
        }
    }};
}

/// Declare a [`CombinationRule`](crate::CombinationRule). Without `ops` the
/// rule unifies all of its children.
///
/// ```ignore
/// combination_rule! {
///     name: "noun -> word",
///     pattern: [TagPattern::Tag(noun)],
///     result: word,
/// }
/// ```
#[macro_export]
macro_rules! combination_rule {
    (
        name: $name:expr,
        pattern: [ $($pat:expr),* $(,)? ],
        result: $result:expr
        $(, ops: [ $($op:expr),* $(,)? ])?
        $(,)?
    ) => {{
        $crate::CombinationRule {
            name: ($name).to_string(),
            pattern: vec![ $($pat),* ],
            result: $result,
            ops: vec![ $($($op),*)? ],
        }
    }};
}
