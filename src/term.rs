//! Hash-consed terms over offset state variables.
//!
//! Terms are built through a [`Terms`] factory which interns them in a
//! hash-consing table: two terms are structurally equal iff they are the
//! same allocation, and every term carries a stable integer *tag* ([`uid`])
//! valid for the factory's lifetime. Engines lean on this for canonical
//! activation literal naming and for term-keyed maps and sets.
//!
//! A [`Var`] is a [`SVar`] (a declared state variable) instantiated at an
//! *offset*, the index of a time frame. Unrolling a predicate to step `k`
//! is a [`bump`]: a rewrite adding `k` to the offset of every free variable.
//!
//! [`uid`]: hashconsing::HConsed::uid (hashconsing's stable tag)
//! [`bump`]: Terms::bump (the offset rewrite)

crate::prelude!();

use hashconsing::{HConsed, HConsign, HashConsign};
use rsmt2::print::{Expr2Smt, Sort2Smt, Sym2Smt};

#[cfg(test)]
mod test;

/// A type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Typ {
    /// Bool type.
    Bool,
    /// Integer type.
    Int,
    /// Rational type.
    Rat,
}
impl Typ {
    /// Creates a bool type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use kinic::term::Typ;
    /// let bool_typ = Typ::bool();
    /// assert_eq!(&bool_typ.to_string(), "bool")
    /// ```
    pub fn bool() -> Self {
        Self::Bool
    }
    /// Creates an integer type.
    pub fn int() -> Self {
        Self::Int
    }
    /// Creates a rational type.
    pub fn rat() -> Self {
        Self::Rat
    }

    /// True if the type is an arithmetic one.
    pub fn is_arith(self) -> bool {
        match self {
            Self::Bool => false,
            Self::Int | Self::Rat => true,
        }
    }

    /// Parses a type from its SMT-LIB sort string.
    pub fn of_smt_str(s: &str) -> Option<Self> {
        match s {
            "Bool" => Some(Self::Bool),
            "Int" => Some(Self::Int),
            "Real" => Some(Self::Rat),
            _ => None,
        }
    }

    /// SMT-LIB sort string.
    pub fn smt_str(self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Int => "Int",
            Self::Rat => "Real",
        }
    }
}
impl Sort2Smt for Typ {
    fn sort_to_smt2<W: Write>(&self, w: &mut W) -> SmtRes<()> {
        write!(w, "{}", self.smt_str())?;
        Ok(())
    }
}
impl fmt::Display for Typ {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bool => write!(fmt, "bool"),
            Self::Int => write!(fmt, "int"),
            Self::Rat => write!(fmt, "rat"),
        }
    }
}

/// Constants.
///
/// Currently only booleans, integers and rationals are supported.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cst {
    /// Bool constant.
    B(bool),
    /// Integer constant.
    I(Int),
    /// Rational constant.
    R(Rat),
}
impl Cst {
    /// Creates a boolean constant.
    pub fn bool(b: bool) -> Self {
        Cst::B(b)
    }
    /// Creates an integer constant.
    pub fn int<I: Into<Int>>(i: I) -> Self {
        Cst::I(i.into())
    }
    /// Creates a rational constant.
    pub fn rat<R: Into<Rat>>(r: R) -> Self {
        Cst::R(r.into())
    }

    /// True if the constant is the boolean `true`.
    pub fn is_true(&self) -> bool {
        *self == Cst::B(true)
    }
    /// True if the constant is the boolean `false`.
    pub fn is_false(&self) -> bool {
        *self == Cst::B(false)
    }

    /// Arithmetic negation, panics on booleans.
    fn arith_neg(self) -> Self {
        match self {
            Self::I(i) => Self::I(-i),
            Self::R(r) => Self::R(-r),
            Self::B(_) => panic!("trying to arithmetically negate a boolean constant"),
        }
    }

    /// Parses a constant from an SMT-LIB value s-expression.
    ///
    /// Handles `true`/`false`, numerals, decimals, `(- <val>)` and
    /// `(/ <val> <val>)`.
    pub fn of_smt_str(input: &str) -> Option<Self> {
        let input = input.trim();
        if input == "true" {
            return Some(Self::B(true));
        } else if input == "false" {
            return Some(Self::B(false));
        }

        if let Some(inner) = sexpr_app(input, "-") {
            let mut subs = split_sexprs(inner);
            match (subs.next().and_then(|s| Self::of_smt_str(s)), subs.next()) {
                (Some(cst), None) => return Some(cst.arith_neg()),
                _ => return None,
            }
        }
        if let Some(inner) = sexpr_app(input, "/") {
            let mut subs = split_sexprs(inner);
            let num = subs.next().and_then(|s| Self::of_smt_str(s));
            let den = subs.next().and_then(|s| Self::of_smt_str(s));
            if subs.next().is_some() {
                return None;
            }
            return match (num, den) {
                (Some(num), Some(den)) => {
                    let (num, den) = (num.to_rat()?, den.to_rat()?);
                    if den.is_zero() {
                        None
                    } else {
                        Some(Self::R(num / den))
                    }
                }
                _ => None,
            };
        }

        if let Some((int_part, dec_part)) = input.split_once('.') {
            let int_part: Int = int_part.parse().ok()?;
            let mut scale = Int::one();
            for _ in 0..dec_part.len() {
                scale *= 10
            }
            let dec: Int = if dec_part.is_empty() {
                Int::from(0)
            } else {
                dec_part.parse().ok()?
            };
            let num = &int_part * &scale + if int_part.is_negative() { -dec } else { dec };
            return Some(Self::R(Rat::new(num, scale)));
        }

        input.parse::<Int>().ok().map(Self::I)
    }

    /// Widens an integer or rational constant to a rational.
    fn to_rat(&self) -> Option<Rat> {
        match self {
            Self::I(i) => Some(Rat::from_integer(i.clone())),
            Self::R(r) => Some(r.clone()),
            Self::B(_) => None,
        }
    }
}
impl HasTyp for Cst {
    fn typ(&self) -> Typ {
        match self {
            Self::B(_) => Typ::Bool,
            Self::I(_) => Typ::Int,
            Self::R(_) => Typ::Rat,
        }
    }
}
impl fmt::Display for Cst {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::B(b) => b.fmt(fmt),
            Self::I(i) => {
                if i.sign() == Sign::Minus {
                    write!(fmt, "(- {})", -i)
                } else {
                    i.fmt(fmt)
                }
            }
            Self::R(r) => {
                let (num, den) = (r.numer(), r.denom());
                match (num.sign(), den.sign()) {
                    (Sign::Minus, Sign::Minus) => write!(fmt, "(/ {} {})", -num, -den),
                    (Sign::Minus, _) => write!(fmt, "(- (/ {} {}))", -num, den),
                    (_, Sign::Minus) => write!(fmt, "(- (/ {} {}))", num, -den),
                    _ => write!(fmt, "(/ {} {})", num, den),
                }
            }
        }
    }
}
impl From<bool> for Cst {
    fn from(b: bool) -> Self {
        Self::B(b)
    }
}
impl From<Int> for Cst {
    fn from(i: Int) -> Self {
        Self::I(i)
    }
}
impl From<usize> for Cst {
    fn from(n: usize) -> Self {
        Self::I(n.into())
    }
}
impl From<Rat> for Cst {
    fn from(r: Rat) -> Self {
        Self::R(r)
    }
}

/// Splits the body of an s-expression application `(<head> <body>)`, if the
/// head matches.
fn sexpr_app<'a>(input: &'a str, head: &str) -> Option<&'a str> {
    let inner = input.strip_prefix('(')?.strip_suffix(')')?.trim();
    inner.strip_prefix(head).and_then(|rest| {
        if rest.starts_with(|c: char| c.is_whitespace()) {
            Some(rest.trim())
        } else {
            None
        }
    })
}

/// Iterates over the top-level s-expressions of a string.
fn split_sexprs(input: &str) -> impl Iterator<Item = &str> {
    let mut rest = input.trim();
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = if rest.starts_with('(') {
            let mut depth = 0usize;
            let mut end = rest.len();
            for (idx, c) in rest.char_indices() {
                match c {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            end = idx + 1;
                            break;
                        }
                    }
                    _ => (),
                }
            }
            end
        } else {
            rest.find(|c: char| c.is_whitespace() || c == '(')
                .unwrap_or(rest.len())
        };
        let (token, tail) = rest.split_at(end);
        rest = tail.trim_start();
        Some(token)
    })
}

/// Operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Op {
    /// If-then-else.
    Ite,
    /// Implication.
    Implies,
    /// Addition.
    Add,
    /// Subtraction, or unary minus.
    Sub,
    /// Multiplication.
    Mul,
    /// Rational division.
    Div,
    /// Integer division.
    IDiv,
    /// Integer modulo.
    Mod,
    /// Greater than or equal to.
    Ge,
    /// Less than or equal to.
    Le,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Equality, *iff* on booleans.
    Eq,
    /// Negation.
    Not,
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
}
impl Op {
    /// Tries to parse an operator from its SMT-LIB symbol.
    pub fn of_smt_str<Str: AsRef<str>>(s: Str) -> Option<Self> {
        use Op::*;
        let res = match s.as_ref() {
            "ite" => Ite,
            "=>" => Implies,
            "+" => Add,
            "-" => Sub,
            "*" => Mul,
            "/" => Div,
            "div" => IDiv,
            "mod" => Mod,
            ">=" => Ge,
            "<=" => Le,
            ">" => Gt,
            "<" => Lt,
            "=" => Eq,
            "not" => Not,
            "and" => And,
            "or" => Or,
            _ => return None,
        };
        Some(res)
    }

    /// SMT-LIB symbol for this operator.
    pub fn smt_str(self) -> &'static str {
        match self {
            Self::Ite => "ite",
            Self::Implies => "=>",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::IDiv => "div",
            Self::Mod => "mod",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "=",
            Self::Not => "not",
            Self::And => "and",
            Self::Or => "or",
        }
    }

    /// True if `self` is an arithmetic relation.
    pub fn is_arith_relation(self) -> bool {
        matches!(self, Self::Ge | Self::Le | Self::Gt | Self::Lt)
    }

    /// Minimal arity of `self`.
    pub fn min_arity(self) -> usize {
        match self {
            Self::Not | Self::Add | Self::Sub => 1,
            Self::Mod
            | Self::Mul
            | Self::Div
            | Self::IDiv
            | Self::And
            | Self::Or
            | Self::Implies
            | Self::Eq
            | Self::Le
            | Self::Lt
            | Self::Ge
            | Self::Gt => 2,
            Self::Ite => 3,
        }
    }

    /// Maximal arity for `self`, `None` if infinite.
    pub fn max_arity(self) -> Option<usize> {
        match self {
            Self::Not => Some(1),
            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::And
            | Self::Or
            | Self::Implies
            | Self::Eq
            | Self::Le
            | Self::Lt
            | Self::Ge
            | Self::Gt => None,
            Self::Mod | Self::Div | Self::IDiv => Some(2),
            Self::Ite => Some(3),
        }
    }

    /// Type-checks an operator application.
    pub fn type_check(self, args: &[Term]) -> Res<Typ> {
        if args.len() < self.min_arity() {
            bail!(
                "`{}` expects at least {} argument(s), got {}",
                self,
                self.min_arity(),
                args.len(),
            )
        }
        if let Some(max) = self.max_arity() {
            if args.len() > max {
                bail!("`{}` expects at most {} argument(s)", self, max)
            }
        }

        let typ = match self {
            Self::Ite => {
                let typ = args[0].typ();
                if typ != Typ::Bool {
                    bail!("expected first argument of type `bool`, got `{}`", typ)
                }

                let thn_typ = args[1].typ();
                let els_typ = args[2].typ();

                if thn_typ != els_typ {
                    bail!(
                        "`{}`'s second and third arguments should have the same type, \
                        got `{}` and `{}`",
                        self,
                        thn_typ,
                        els_typ,
                    )
                }

                thn_typ
            }
            Self::Implies | Self::And | Self::Or | Self::Not => {
                if args.iter().any(|e| e.typ() != Typ::Bool) {
                    bail!("`{}`'s arguments must all be boolean expressions", self)
                }
                Typ::Bool
            }

            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::IDiv
            | Self::Mod
            | Self::Le
            | Self::Ge
            | Self::Lt
            | Self::Gt => {
                let mut typs = args.iter().map(|t| t.typ());
                let first = typs.next().expect("at least one argument");
                if !first.is_arith() {
                    bail!(
                        "`{}`'s arguments must have an arithmetic type, unexpected type `{}`",
                        self,
                        first,
                    )
                }
                for typ in typs {
                    if typ != first {
                        bail!(
                            "`{}`'s arguments must all have the same type, found `{}` and `{}`",
                            self,
                            first,
                            typ,
                        )
                    }
                }
                if (self == Self::IDiv || self == Self::Mod) && first != Typ::Int {
                    bail!(
                        "`{}` can only be applied to integer arguments, found `{}`",
                        self,
                        first,
                    )
                }

                if self == Self::Div {
                    Typ::Rat
                } else if self.is_arith_relation() {
                    Typ::Bool
                } else {
                    first
                }
            }

            Self::Eq => {
                let mut typs = args.iter().map(|t| t.typ());
                let first = typs.next().expect("at least one argument");
                for typ in typs {
                    if typ != first {
                        bail!(
                            "`{}`'s arguments must all have the same type, found `{}` and `{}`",
                            self,
                            first,
                            typ,
                        )
                    }
                }
                Typ::Bool
            }
        };

        Ok(typ)
    }
}
impl fmt::Display for Op {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.smt_str())
    }
}

/// Trait implemented by everything that has a type.
pub trait HasTyp {
    /// Type accessor.
    fn typ(&self) -> Typ;
}

/// A declared state variable.
///
/// State variables live in a *scope*, a sequence of name segments; the
/// engines use sub-scopes to keep their synthesized variables (abstraction
/// booleans, clones) apart from the system's. A state variable is just a
/// declaration: to appear in a term it must be instantiated at an offset,
/// which yields a [`Var`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SVar {
    /// Scope of the variable.
    scope: Vec<String>,
    /// Variable identifier.
    id: String,
    /// Type of the variable.
    typ: Typ,
    /// True if the variable is an input.
    input: bool,
    /// True if the variable is constant (never changed by the transition
    /// relation).
    konst: bool,
}
impl SVar {
    /// Constructor for plain state variables.
    pub fn new(scope: Vec<String>, id: impl Into<String>, typ: Typ) -> Self {
        Self {
            scope,
            id: id.into(),
            typ,
            input: false,
            konst: false,
        }
    }
    /// Constructor for input variables.
    pub fn new_input(scope: Vec<String>, id: impl Into<String>, typ: Typ) -> Self {
        Self {
            input: true,
            ..Self::new(scope, id, typ)
        }
    }
    /// Constructor for constant variables.
    pub fn new_const(scope: Vec<String>, id: impl Into<String>, typ: Typ) -> Self {
        Self {
            konst: true,
            ..Self::new(scope, id, typ)
        }
    }

    /// Identifier accessor.
    pub fn id(&self) -> &str {
        &self.id
    }
    /// Scope accessor.
    pub fn scope(&self) -> &[String] {
        &self.scope
    }
    /// True if the variable is an input.
    pub fn is_input(&self) -> bool {
        self.input
    }
    /// True if the variable is constant.
    pub fn is_const(&self) -> bool {
        self.konst
    }

    /// A variable with the same identifier and type living in a sub-scope.
    pub fn in_subscope(&self, segment: impl Into<String>) -> Self {
        let mut scope = self.scope.clone();
        scope.push(segment.into());
        Self {
            scope,
            ..self.clone()
        }
    }

    /// Fully qualified identifier, scope segments separated by `.`.
    pub fn qual_id(&self) -> String {
        if self.scope.is_empty() {
            self.id.clone()
        } else {
            format!("{}.{}", self.scope.join("."), self.id)
        }
    }

    /// Instance of this variable at some offset.
    pub fn at(&self, offset: impl Into<Int>) -> Var {
        Var::new(self.clone(), offset)
    }
}
impl HasTyp for SVar {
    fn typ(&self) -> Typ {
        self.typ
    }
}
impl fmt::Display for SVar {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.qual_id())
    }
}

/// A state variable instance: a [`SVar`] at an offset.
///
/// The offset is an arbitrary-precision integer; it is typically a small
/// time-frame index, but interpolant un-bumping can transiently go through
/// negative offsets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var {
    /// Underlying state variable.
    svar: SVar,
    /// Time-frame offset.
    offset: Int,
}
impl Var {
    /// Constructor.
    pub fn new(svar: SVar, offset: impl Into<Int>) -> Self {
        Self {
            svar,
            offset: offset.into(),
        }
    }

    /// Underlying state variable.
    pub fn svar(&self) -> &SVar {
        &self.svar
    }
    /// Offset accessor.
    pub fn offset(&self) -> &Int {
        &self.offset
    }

    /// Same variable, offset shifted by `k`.
    pub fn bumped(&self, k: &Int) -> Self {
        Self {
            svar: self.svar.clone(),
            offset: &self.offset + k,
        }
    }

    /// The SMT constant name of this instance: `<qual_id>@<offset>`.
    pub fn smt_id(&self) -> String {
        format!("{}@{}", self.svar.qual_id(), self.offset)
    }
}
impl HasTyp for Var {
    fn typ(&self) -> Typ {
        self.svar.typ()
    }
}
impl Sym2Smt<()> for Var {
    fn sym_to_smt2<W: Write>(&self, w: &mut W, _: ()) -> SmtRes<()> {
        write!(w, "{}@{}", self.svar.qual_id(), self.offset)?;
        Ok(())
    }
}
impl fmt::Display for Var {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}@{}", self.svar.qual_id(), self.offset)
    }
}

/// The raw term structure, interned by the [`Terms`] factory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RTerm {
    /// A constant.
    Cst(Cst),
    /// A state variable instance.
    Var(Var),
    /// An operator application.
    App {
        /// The operator.
        op: Op,
        /// The arguments.
        args: Vec<Term>,
    },
}
impl HasTyp for RTerm {
    fn typ(&self) -> Typ {
        match self {
            Self::Cst(cst) => cst.typ(),
            Self::Var(var) => var.typ(),
            Self::App { op, args } => match op.type_check(args) {
                Ok(typ) => typ,
                Err(e) => panic!("illegal operator application `{}`: {}", self, e),
            },
        }
    }
}
impl fmt::Display for RTerm {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Cst(cst) => cst.fmt(fmt),
            Self::Var(var) => var.fmt(fmt),
            Self::App { op, args } => {
                write!(fmt, "({}", op)?;
                for arg in args {
                    write!(fmt, " {}", arg.get())?
                }
                write!(fmt, ")")
            }
        }
    }
}

/// A hash-consed term.
///
/// Structural equality coincides with pointer equality, and
/// [`uid`](hashconsing::HConsed::uid) is the term's stable tag.
pub type Term = HConsed<RTerm>;

impl HasTyp for Term {
    fn typ(&self) -> Typ {
        self.get().typ()
    }
}

/// Wrapper printing a [`Term`] in SMT-LIB 2 syntax.
pub struct SmtTerm<'a>(pub &'a Term);
impl<'a> Expr2Smt<()> for SmtTerm<'a> {
    fn expr_to_smt2<W: Write>(&self, w: &mut W, _: ()) -> SmtRes<()> {
        write!(w, "{}", self.0.get())?;
        Ok(())
    }
}

/// A valuation of SMT constants, keyed by their instance name (`v@7`).
///
/// This is what a `get-model` answer boils down to for the engines: every
/// state variable, abstraction boolean and clone instance mapped to a
/// constant. Composite terms are evaluated against it with
/// [`Terms::eval`].
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    map: Map<String, Cst>,
}
impl Assignment {
    /// Empty assignment.
    pub fn new() -> Self {
        Self { map: Map::new() }
    }

    /// Inserts a value for an instance symbol.
    pub fn insert(&mut self, sym: impl Into<String>, cst: Cst) -> Option<Cst> {
        self.map.insert(sym.into(), cst)
    }

    /// Value of an instance symbol, if any.
    pub fn get(&self, sym: &str) -> Option<&Cst> {
        self.map.get(sym)
    }

    /// Value of a variable instance, if any.
    pub fn of_var(&self, var: &Var) -> Option<&Cst> {
        self.map.get(&var.smt_id())
    }

    /// Iterator over the (symbol, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Cst)> {
        self.map.iter()
    }

    /// Number of valuations.
    pub fn len(&self) -> usize {
        self.map.len()
    }
    /// True if there are no valuations.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// The term factory.
///
/// Owns the hash-consing table; cheap to clone, clones share the table. All
/// term construction and rewriting goes through a factory so that identical
/// terms are identical allocations with the same tag.
#[derive(Clone)]
pub struct Terms {
    factory: Arc<RwLock<HConsign<RTerm>>>,
}
impl Default for Terms {
    fn default() -> Self {
        Self::new()
    }
}
impl Terms {
    /// Creates an empty factory.
    pub fn new() -> Self {
        Self {
            factory: Arc::new(RwLock::new(HConsign::empty())),
        }
    }

    /// Interns a raw term.
    fn hcons(&self, raw: RTerm) -> Term {
        self.factory.as_ref().mk(raw)
    }

    /// Constant term.
    pub fn cst(&self, cst: impl Into<Cst>) -> Term {
        self.hcons(RTerm::Cst(cst.into()))
    }
    /// The `true` term.
    pub fn tru(&self) -> Term {
        self.cst(true)
    }
    /// The `false` term.
    pub fn fls(&self) -> Term {
        self.cst(false)
    }
    /// Integer constant term.
    pub fn int(&self, i: impl Into<Int>) -> Term {
        self.cst(Cst::I(i.into()))
    }

    /// Variable term.
    pub fn var(&self, var: Var) -> Term {
        self.hcons(RTerm::Var(var))
    }
    /// Variable term for a state variable at an offset.
    pub fn svar_at(&self, svar: &SVar, offset: impl Into<Int>) -> Term {
        self.var(svar.at(offset))
    }

    /// Type-checked operator application.
    pub fn app(&self, op: Op, args: Vec<Term>) -> Res<Term> {
        op.type_check(&args)?;
        Ok(self.raw_app(op, args))
    }

    /// Operator application, no type-check.
    ///
    /// Only for internal construction sites where argument types are known
    /// by construction.
    fn raw_app(&self, op: Op, args: Vec<Term>) -> Term {
        self.hcons(RTerm::App { op, args })
    }

    /// Conjunction; empty conjunctions are `true`.
    pub fn and(&self, args: Vec<Term>) -> Term {
        let mut kept = Vec::with_capacity(args.len());
        for arg in args {
            match arg.get() {
                RTerm::Cst(Cst::B(true)) => (),
                RTerm::Cst(Cst::B(false)) => return self.fls(),
                _ => kept.push(arg),
            }
        }
        match kept.len() {
            0 => self.tru(),
            1 => kept.pop().expect("non-empty"),
            _ => self.raw_app(Op::And, kept),
        }
    }

    /// Disjunction; empty disjunctions are `false`.
    pub fn or(&self, args: Vec<Term>) -> Term {
        let mut kept = Vec::with_capacity(args.len());
        for arg in args {
            match arg.get() {
                RTerm::Cst(Cst::B(false)) => (),
                RTerm::Cst(Cst::B(true)) => return self.tru(),
                _ => kept.push(arg),
            }
        }
        match kept.len() {
            0 => self.fls(),
            1 => kept.pop().expect("non-empty"),
            _ => self.raw_app(Op::Or, kept),
        }
    }

    /// Negation; collapses double negations and constant arguments.
    pub fn not(&self, term: Term) -> Term {
        match term.get() {
            RTerm::Cst(Cst::B(b)) => self.cst(!b),
            RTerm::App { op: Op::Not, args } => args[0].clone(),
            _ => self.raw_app(Op::Not, vec![term]),
        }
    }

    /// Implication.
    pub fn implies(&self, lhs: Term, rhs: Term) -> Term {
        self.raw_app(Op::Implies, vec![lhs, rhs])
    }

    /// Equality (which is *iff* on booleans).
    pub fn eq(&self, lhs: Term, rhs: Term) -> Term {
        self.raw_app(Op::Eq, vec![lhs, rhs])
    }

    /// Rewrites the free variables of a term.
    ///
    /// `f` returns `None` to leave a variable unchanged. The rewrite is
    /// memoized on the term DAG, so shared sub-terms are visited once.
    pub fn map_vars(&self, term: &Term, f: &mut impl FnMut(&Var) -> Option<Var>) -> Term {
        let mut memo: HConMap<Term, Term> = HConMap::new();
        self.map_vars_memo(term, f, &mut memo)
    }
    fn map_vars_memo(
        &self,
        term: &Term,
        f: &mut impl FnMut(&Var) -> Option<Var>,
        memo: &mut HConMap<Term, Term>,
    ) -> Term {
        if let Some(done) = memo.get(term) {
            return done.clone();
        }
        let res = match term.get() {
            RTerm::Cst(_) => term.clone(),
            RTerm::Var(var) => match f(var) {
                Some(nu_var) => self.var(nu_var),
                None => term.clone(),
            },
            RTerm::App { op, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.map_vars_memo(arg, f, memo))
                    .collect();
                self.raw_app(*op, args)
            }
        };
        memo.insert(term.clone(), res.clone());
        res
    }

    /// Bumps a term: shifts the offset of every free variable by `k`.
    ///
    /// Bumping by `k` then `-k` yields the original term.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use kinic::term::{SVar, Terms, Typ};
    /// let terms = Terms::new();
    /// let cnt = SVar::new(vec!["sys".into()], "cnt", Typ::Int);
    /// let pred = terms.eq(terms.svar_at(&cnt, 0), terms.int(0));
    /// let bumped = terms.bump(&pred, 7);
    /// assert_eq!(bumped.get().to_string(), "(= sys.cnt@7 0)");
    /// assert_eq!(terms.bump(&bumped, -7), pred);
    /// ```
    pub fn bump(&self, term: &Term, k: impl Into<Int>) -> Term {
        let k = k.into();
        if k.is_zero() {
            return term.clone();
        }
        self.map_vars(term, &mut |var| Some(var.bumped(&k)))
    }

    /// Substitutes whole sub-terms, top-down.
    ///
    /// Whenever a sub-term is a key of `map` it is replaced by the
    /// associated term and the rewrite does not descend further.
    pub fn subst(&self, term: &Term, map: &HConMap<Term, Term>) -> Term {
        let mut memo: HConMap<Term, Term> = HConMap::new();
        self.subst_memo(term, map, &mut memo)
    }
    fn subst_memo(
        &self,
        term: &Term,
        map: &HConMap<Term, Term>,
        memo: &mut HConMap<Term, Term>,
    ) -> Term {
        if let Some(done) = memo.get(term) {
            return done.clone();
        }
        let res = if let Some(image) = map.get(term) {
            image.clone()
        } else {
            match term.get() {
                RTerm::Cst(_) | RTerm::Var(_) => term.clone(),
                RTerm::App { op, args } => {
                    let args = args
                        .iter()
                        .map(|arg| self.subst_memo(arg, map, memo))
                        .collect();
                    self.raw_app(*op, args)
                }
            }
        };
        memo.insert(term.clone(), res.clone());
        res
    }

    /// The free variables of a term.
    pub fn vars(&self, term: &Term) -> Set<Var> {
        let mut res = Set::new();
        let mut seen: HConSet<Term> = HConSet::new();
        let mut todo = vec![term.clone()];
        while let Some(term) = todo.pop() {
            if !seen.insert(term.clone()) {
                continue;
            }
            match term.get() {
                RTerm::Cst(_) => (),
                RTerm::Var(var) => {
                    res.insert(var.clone());
                }
                RTerm::App { args, .. } => todo.extend(args.iter().cloned()),
            }
        }
        res
    }

    /// The atoms of a boolean term, in order of first appearance.
    ///
    /// An atom is a boolean variable or a relation/equality over non-boolean
    /// arguments; boolean structure (`and`, `or`, `not`, `=>`, boolean `=`
    /// and boolean `ite`) is traversed.
    pub fn atoms(&self, term: &Term) -> Vec<Term> {
        let mut res = Vec::new();
        let mut seen: HConSet<Term> = HConSet::new();
        self.atoms_acc(term, &mut seen, &mut res);
        res
    }
    fn atoms_acc(&self, term: &Term, seen: &mut HConSet<Term>, res: &mut Vec<Term>) {
        if !seen.insert(term.clone()) {
            return;
        }
        match term.get() {
            RTerm::Cst(_) => (),
            RTerm::Var(var) => {
                if var.typ() == Typ::Bool {
                    res.push(term.clone())
                }
            }
            RTerm::App { op, args } => match op {
                Op::Not | Op::And | Op::Or | Op::Implies => {
                    for arg in args {
                        self.atoms_acc(arg, seen, res)
                    }
                }
                Op::Eq | Op::Ite if args.iter().all(|arg| arg.typ() == Typ::Bool) => {
                    for arg in args {
                        self.atoms_acc(arg, seen, res)
                    }
                }
                _ => {
                    if term.typ() == Typ::Bool {
                        res.push(term.clone())
                    }
                }
            },
        }
    }

    /// Evaluates a term against an assignment.
    ///
    /// Fails if a free variable has no valuation.
    pub fn eval(&self, term: &Term, model: &Assignment) -> Res<Cst> {
        let mut memo: HConMap<Term, Cst> = HConMap::new();
        self.eval_memo(term, model, &mut memo)
    }
    fn eval_memo(
        &self,
        term: &Term,
        model: &Assignment,
        memo: &mut HConMap<Term, Cst>,
    ) -> Res<Cst> {
        if let Some(done) = memo.get(term) {
            return Ok(done.clone());
        }
        let res = match term.get() {
            RTerm::Cst(cst) => cst.clone(),
            RTerm::Var(var) => model
                .of_var(var)
                .cloned()
                .ok_or_else(|| format!("no valuation for variable `{}`", var))?,
            RTerm::App { op, args } => {
                let mut vals = Vec::with_capacity(args.len());
                for arg in args {
                    vals.push(self.eval_memo(arg, model, memo)?)
                }
                eval_app(*op, vals)?
            }
        };
        memo.insert(term.clone(), res.clone());
        Ok(res)
    }
}

/// Evaluates an operator application over constant arguments.
fn eval_app(op: Op, args: Vec<Cst>) -> Res<Cst> {
    use num::Integer;

    macro_rules! bool_args {
        () => {{
            let mut bools = Vec::with_capacity(args.len());
            for arg in &args {
                match arg {
                    Cst::B(b) => bools.push(*b),
                    _ => bail!("expected boolean argument for `{}`, got `{}`", op, arg),
                }
            }
            bools
        }};
    }

    let res = match op {
        Op::Not => {
            let bools = bool_args!();
            Cst::B(!bools[0])
        }
        Op::And => Cst::B(bool_args!().into_iter().all(|b| b)),
        Op::Or => Cst::B(bool_args!().into_iter().any(|b| b)),
        Op::Implies => {
            let bools = bool_args!();
            // `a => b => c` is right-associated by SMT-LIB.
            let mut res = *bools.last().expect("checked arity");
            for b in bools[..bools.len() - 1].iter().rev() {
                res = !b || res;
            }
            Cst::B(res)
        }
        Op::Ite => match &args[0] {
            Cst::B(true) => args[1].clone(),
            Cst::B(false) => args[2].clone(),
            cst => bail!("expected boolean condition for `ite`, got `{}`", cst),
        },
        Op::Eq => Cst::B(args.windows(2).all(|pair| pair[0] == pair[1])),

        Op::Ge | Op::Le | Op::Gt | Op::Lt => {
            let mut res = true;
            for pair in args.windows(2) {
                let cmp = arith_cmp(&pair[0], &pair[1])?;
                res = res
                    && match op {
                        Op::Ge => cmp != std::cmp::Ordering::Less,
                        Op::Le => cmp != std::cmp::Ordering::Greater,
                        Op::Gt => cmp == std::cmp::Ordering::Greater,
                        Op::Lt => cmp == std::cmp::Ordering::Less,
                        _ => unreachable!(),
                    };
            }
            Cst::B(res)
        }

        Op::Add | Op::Sub | Op::Mul => {
            let mut iter = args.iter();
            let first = iter.next().expect("checked arity").clone();
            if args.len() == 1 {
                if op == Op::Sub {
                    first.arith_neg_checked()?
                } else {
                    first
                }
            } else {
                let mut acc = first;
                for arg in iter {
                    acc = arith_bin(op, acc, arg)?;
                }
                acc
            }
        }

        Op::Div => {
            let (lft, rgt) = (&args[0], &args[1]);
            match (lft.to_rat(), rgt.to_rat()) {
                (Some(lft), Some(rgt)) => {
                    if rgt.is_zero() {
                        bail!("division by zero while evaluating `{}`", op)
                    }
                    Cst::R(lft / rgt)
                }
                _ => bail!("expected arithmetic arguments for `{}`", op),
            }
        }
        Op::IDiv | Op::Mod => match (&args[0], &args[1]) {
            (Cst::I(lft), Cst::I(rgt)) => {
                if rgt.is_zero() {
                    bail!("division by zero while evaluating `{}`", op)
                }
                if op == Op::IDiv {
                    Cst::I(lft.div_floor(rgt))
                } else {
                    Cst::I(lft.mod_floor(rgt))
                }
            }
            _ => bail!("expected integer arguments for `{}`", op),
        },
    };
    Ok(res)
}

impl Cst {
    /// Arithmetic negation as a result.
    fn arith_neg_checked(self) -> Res<Self> {
        match self {
            Self::B(_) => bail!("cannot arithmetically negate a boolean"),
            cst => Ok(cst.arith_neg()),
        }
    }
}

/// Compares two arithmetic constants.
fn arith_cmp(lft: &Cst, rgt: &Cst) -> Res<std::cmp::Ordering> {
    match (lft, rgt) {
        (Cst::I(lft), Cst::I(rgt)) => Ok(lft.cmp(rgt)),
        (Cst::R(lft), Cst::R(rgt)) => Ok(lft.cmp(rgt)),
        _ => bail!("cannot compare `{}` and `{}`", lft, rgt),
    }
}

/// Applies a binary arithmetic operator to two constants.
fn arith_bin(op: Op, lft: Cst, rgt: &Cst) -> Res<Cst> {
    let res = match (lft, rgt) {
        (Cst::I(lft), Cst::I(rgt)) => Cst::I(match op {
            Op::Add => lft + rgt,
            Op::Sub => lft - rgt,
            Op::Mul => lft * rgt,
            _ => bail!("unexpected arithmetic operator `{}`", op),
        }),
        (Cst::R(lft), Cst::R(rgt)) => Cst::R(match op {
            Op::Add => lft + rgt,
            Op::Sub => lft - rgt,
            Op::Mul => lft * rgt,
            _ => bail!("unexpected arithmetic operator `{}`", op),
        }),
        (lft, rgt) => bail!("ill-typed application of `{}` to `{}`, `{}`", op, lft, rgt),
    };
    Ok(res)
}
