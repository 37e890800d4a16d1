//! The ADT environment: declared types, their constructors, aliases,
//! record fields, and carrier registrations.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::ty::{subst_vars, Scheme, Ty, TyVar};

/// One registered constructor.
#[derive(Clone, Debug, Serialize)]
pub struct CtorInfo {
    pub name: String,
    pub arity: usize,
    /// Generalised scheme `forall params. arg1 -> ... -> argk ->
    /// Ctor(name, params)`.
    pub scheme: Scheme,
}

/// One registered type.
#[derive(Clone, Debug, Serialize)]
pub struct AdtInfo {
    pub name: String,
    /// Parameter variables the constructors and alias body reference.
    pub params: Vec<TyVar>,
    pub ctors: Vec<CtorInfo>,
    /// Alias body, referencing `params`. Aliases expand during
    /// unification and type-expression translation.
    pub alias: Option<Ty>,
    /// Declared record fields (from a record alias), referencing
    /// `params`. Enables the bare-vs-record constructor-form sugar.
    pub record_fields: Option<Vec<(String, Ty)>>,
}

/// All type declarations visible to a compilation unit.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AdtEnv {
    types: FxHashMap<String, AdtInfo>,
    /// Constructor name -> owning type name. Constructor names are
    /// program-global.
    ctor_owner: FxHashMap<String, String>,
    /// Carrier type name -> domain name.
    carrier_domains: FxHashMap<String, String>,
    /// Domain name -> carrier type name.
    carrier_types: FxHashMap<String, String>,
}

/// A carrier type split into its components.
#[derive(Clone, Debug)]
pub struct CarrierParts {
    pub domain: String,
    pub ctor_name: String,
    pub value: Ty,
    pub state: Ty,
}

impl AdtEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&AdtInfo> {
        self.types.get(name)
    }

    pub fn insert(&mut self, info: AdtInfo) {
        self.types.insert(info.name.clone(), info);
    }

    /// Remove a type entirely (staged-rollback path for invalid
    /// declarations). Also drops its constructor index entries.
    pub fn remove(&mut self, name: &str) -> Option<AdtInfo> {
        let info = self.types.remove(name)?;
        self.ctor_owner.retain(|_, owner| owner != name);
        Some(info)
    }

    pub fn types(&self) -> impl Iterator<Item = &AdtInfo> {
        self.types.values()
    }

    /// Register a constructor as belonging to `type_name`. Fails (returns
    /// the previous owner) if the constructor name is already taken.
    pub fn claim_ctor(&mut self, ctor: &str, type_name: &str) -> Result<(), String> {
        match self.ctor_owner.get(ctor) {
            Some(owner) => Err(owner.clone()),
            None => {
                self.ctor_owner
                    .insert(ctor.to_string(), type_name.to_string());
                Ok(())
            }
        }
    }

    pub fn release_ctor(&mut self, ctor: &str) {
        self.ctor_owner.remove(ctor);
    }

    /// Look up a constructor by its program-global name.
    pub fn ctor(&self, name: &str) -> Option<(&AdtInfo, &CtorInfo)> {
        let owner = self.ctor_owner.get(name)?;
        let info = self.types.get(owner)?;
        let ctor = info.ctors.iter().find(|c| c.name == name)?;
        Some((info, ctor))
    }

    pub fn ctor_owner(&self, name: &str) -> Option<&str> {
        self.ctor_owner.get(name).map(String::as_str)
    }

    // ── Carriers ────────────────────────────────────────────────────────

    /// Register `type_name` as the carrier of `domain`. A carrier wraps a
    /// value component and a state component: `Eff<V, E>`.
    pub fn register_carrier(&mut self, type_name: &str, domain: &str) {
        self.carrier_domains
            .insert(type_name.to_string(), domain.to_string());
        self.carrier_types
            .insert(domain.to_string(), type_name.to_string());
    }

    pub fn carrier_domain(&self, type_name: &str) -> Option<&str> {
        self.carrier_domains.get(type_name).map(String::as_str)
    }

    pub fn carrier_type(&self, domain: &str) -> Option<&str> {
        self.carrier_types.get(domain).map(String::as_str)
    }

    /// Split a carrier type into `{domain, value, state}`.
    pub fn split_carrier(&self, ty: &Ty) -> Option<CarrierParts> {
        match ty {
            Ty::Ctor { name, args } if args.len() == 2 => {
                let domain = self.carrier_domains.get(name)?;
                Some(CarrierParts {
                    domain: domain.clone(),
                    ctor_name: name.clone(),
                    value: args[0].clone(),
                    state: args[1].clone(),
                })
            }
            _ => None,
        }
    }

    /// Rebuild a carrier from its components.
    pub fn join_carrier(&self, domain: &str, value: Ty, state: Ty) -> Option<Ty> {
        let name = self.carrier_types.get(domain)?;
        Some(Ty::ctor(name.clone(), vec![value, state]))
    }

    // ── Aliases ─────────────────────────────────────────────────────────

    /// Expand `name<args>` through its alias, if `name` is an alias at
    /// the right arity.
    pub fn expand_alias(&self, name: &str, args: &[Ty]) -> Option<Ty> {
        let info = self.types.get(name)?;
        let body = info.alias.as_ref()?;
        if info.params.len() != args.len() {
            return None;
        }
        let mapping: FxHashMap<TyVar, Ty> = info
            .params
            .iter()
            .copied()
            .zip(args.iter().cloned())
            .collect();
        Some(subst_vars(body, &mapping))
    }

    /// Declared record fields of `name`, instantiated at `args`.
    pub fn record_fields_at(&self, name: &str, args: &[Ty]) -> Option<Vec<(String, Ty)>> {
        let info = self.types.get(name)?;
        let fields = info.record_fields.as_ref()?;
        if info.params.len() != args.len() {
            return None;
        }
        let mapping: FxHashMap<TyVar, Ty> = info
            .params
            .iter()
            .copied()
            .zip(args.iter().cloned())
            .collect();
        Some(
            fields
                .iter()
                .map(|(n, t)| (n.clone(), subst_vars(t, &mapping)))
                .collect(),
        )
    }
}
