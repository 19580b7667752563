//! Procedural macros for the cocom object model.
//!
//! Provides:
//! - `#[interface("guid")]` - Define an interface extending exactly one parent
//! - `#[object(Interface)]` - Declare the most-derived interface of an implementation type
//!
//! ## What `#[interface]` generates
//!
//! For `pub trait IFoo: IParent { fn bar(&self, x: i32) -> i32; }`:
//! - `IFoo` - the `#[repr(C)]` interface view, dereferencing to `IParent`
//! - `IFooVTable` - the vtable, with `IParent`'s vtable embedded as `base`
//! - `IFooImpl` - the trait implementation types provide (`IFooImpl: IParentImpl`)
//! - `IID_IFOO` - the interface GUID
//! - safe wrapper methods on `IFoo` that dispatch through the vtable
//! - `Interface`, `VTableLayout` and `Bind` impls wiring it all together
//!
//! Slots are laid out in declaration order after the inherited ones. An
//! explicit `#[slot(N)]` (relative to the first own slot) leaves reserved
//! gaps that abort if called.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Attribute, Expr, FnArg, Ident, Item, ItemTrait, Lit, LitStr, Meta, Pat, Path, TraitItem,
    TraitItemFn, Type, TypeParamBound, parse_macro_input, spanned::Spanned,
};

/// Path to the runtime crate as seen from generated code.
fn crate_path() -> TokenStream2 {
    quote! { ::cocom }
}

// =============================================================================
// Validation helpers for FFI-safety
// =============================================================================

/// Check if a type is known to be non-FFI-safe
fn check_ffi_safe_type(ty: &Type) -> Result<(), String> {
    match ty {
        Type::Path(type_path) => {
            if let Some(segment) = type_path.path.segments.last() {
                let name = segment.ident.to_string();
                match name.as_str() {
                    "String" => {
                        return Err(
                            "String is not FFI-safe. Use *const c_char or *const u8 instead".into(),
                        );
                    }
                    "Vec" => {
                        return Err(
                            "Vec<T> is not FFI-safe. Use *const T and a length parameter instead"
                                .into(),
                        );
                    }
                    "Box" => return Err("Box<T> is not FFI-safe. Use *mut T instead".into()),
                    "Rc" | "Arc" | "StrongRef" | "WeakRef" => {
                        return Err(format!(
                            "{name} is not FFI-safe. Pass a raw interface pointer instead"
                        ));
                    }
                    "Result" => {
                        return Err(
                            "Result<T, E> is not FFI-safe. Return an HResult and use out-parameters instead"
                                .into(),
                        );
                    }
                    "str" => {
                        return Err(
                            "str is not FFI-safe. Use *const c_char or *const u8 instead".into(),
                        );
                    }
                    _ => {}
                }
            }
        }
        Type::Reference(type_ref) => {
            let mutability = if type_ref.mutability.is_some() {
                "&mut "
            } else {
                "&"
            };
            return Err(format!(
                "{mutability}T references are not allowed in interface methods. Use *const T or *mut T instead. \
                 References have Rust-specific guarantees that foreign callers won't uphold"
            ));
        }
        Type::Slice(_) => {
            return Err(
                "Slices [T] are not FFI-safe. Use *const T and a length parameter instead".into(),
            );
        }
        Type::TraitObject(_) => {
            return Err("Trait objects (dyn Trait) are not FFI-safe".into());
        }
        Type::ImplTrait(_) => {
            return Err("impl Trait is not FFI-safe".into());
        }
        Type::Tuple(tuple) if !tuple.elems.is_empty() => {
            return Err(
                "Non-empty tuples are not FFI-safe. Use a #[repr(C)] struct instead".into(),
            );
        }
        _ => {}
    }
    Ok(())
}

/// Validate an interface method signature
fn validate_method(method: &TraitItemFn) -> Result<(), syn::Error> {
    let method_name = &method.sig.ident;
    let span = method_name.span();

    if method.sig.asyncness.is_some() {
        return Err(syn::Error::new(
            span,
            format!("method '{method_name}': async functions are not supported in interfaces"),
        ));
    }

    if !method.sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            span,
            format!("method '{method_name}': generic methods are not supported in interfaces"),
        ));
    }

    if method.sig.variadic.is_some() {
        return Err(syn::Error::new(
            span,
            format!("method '{method_name}': variadic methods are not supported in interfaces"),
        ));
    }

    if method_name == "base" || method_name.to_string().starts_with("__reserved_slot_") {
        return Err(syn::Error::new(
            span,
            format!("method '{method_name}': name is reserved for vtable fields"),
        ));
    }

    match method.sig.inputs.first() {
        Some(FnArg::Receiver(receiver)) => {
            if receiver.reference.is_none() {
                return Err(syn::Error::new(
                    receiver.self_token.span(),
                    format!("method '{method_name}': self by value is not supported. Use &self instead"),
                ));
            }
            if receiver.mutability.is_some() {
                return Err(syn::Error::new(
                    receiver.self_token.span(),
                    format!(
                        "method '{method_name}': &mut self is not supported. Objects are shared \
                         between references; use interior mutability and &self"
                    ),
                ));
            }
        }
        _ => {
            return Err(syn::Error::new(
                span,
                format!(
                    "method '{method_name}': must take &self (interface methods require a this pointer)"
                ),
            ));
        }
    }

    for arg in method.sig.inputs.iter().skip(1) {
        let FnArg::Typed(pat_type) = arg else {
            continue;
        };
        match pat_type.pat.as_ref() {
            Pat::Ident(pat_ident) if pat_ident.ident == "this" => {
                return Err(syn::Error::new(
                    pat_ident.span(),
                    format!("method '{method_name}': parameter name 'this' is reserved"),
                ));
            }
            Pat::Ident(_) => {}
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    format!("method '{method_name}': parameters must be plain identifiers"),
                ));
            }
        }
        if let Err(msg) = check_ffi_safe_type(&pat_type.ty) {
            return Err(syn::Error::new(
                pat_type.ty.span(),
                format!("method '{method_name}': {msg}"),
            ));
        }
    }

    if let syn::ReturnType::Type(_, ty) = &method.sig.output
        && let Err(msg) = check_ffi_safe_type(ty)
    {
        return Err(syn::Error::new(
            ty.span(),
            format!("method '{method_name}': return type - {msg}"),
        ));
    }

    Ok(())
}

/// Validate a trait definition and return its single parent interface.
fn validate_trait(input: &ItemTrait) -> Result<Path, syn::Error> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "generic interfaces are not supported",
        ));
    }
    if input.unsafety.is_some() || input.auto_token.is_some() {
        return Err(syn::Error::new(
            input.ident.span(),
            "interfaces cannot be unsafe or auto traits",
        ));
    }

    let mut parents = input.supertraits.iter().filter_map(|bound| match bound {
        TypeParamBound::Trait(t) => Some(t),
        _ => None,
    });
    let parent = match (parents.next(), parents.next()) {
        (Some(parent), None) => parent,
        (None, _) => {
            return Err(syn::Error::new(
                input.ident.span(),
                format!(
                    "interface '{}' must extend exactly one parent interface (e.g. `: IUnknown`)",
                    input.ident
                ),
            ));
        }
        (Some(_), Some(second)) => {
            return Err(syn::Error::new(
                second.span(),
                "interfaces support single inheritance only",
            ));
        }
    };
    if parent
        .path
        .segments
        .iter()
        .any(|s| !s.arguments.is_none())
    {
        return Err(syn::Error::new(
            parent.path.span(),
            "parent interface cannot take generic arguments",
        ));
    }

    for item in &input.items {
        match item {
            TraitItem::Fn(method) => validate_method(method)?,
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "interfaces may only contain methods",
                ));
            }
        }
    }

    Ok(parent.path.clone())
}

/// Parse #[slot(N)] from a list of attributes.
fn parse_slot_attr(attrs: &[Attribute]) -> Result<Option<usize>, syn::Error> {
    for attr in attrs {
        if !attr.path().is_ident("slot") {
            continue;
        }
        if let Meta::List(meta_list) = &attr.meta
            && let Ok(Expr::Lit(expr_lit)) = syn::parse2::<Expr>(meta_list.tokens.clone())
            && let Lit::Int(lit_int) = &expr_lit.lit
        {
            return lit_int.base10_parse::<usize>().map(Some);
        }
        return Err(syn::Error::new(
            attr.span(),
            "expected #[slot(N)] with an integer literal",
        ));
    }
    Ok(None)
}

/// Name of the implementation trait paired with `parent`.
///
/// The root interfaces live in the runtime crate; everything else is expected
/// next to its interface (`a::b::IFoo` -> `a::b::IFooImpl`).
fn impl_trait_path(parent: &Path) -> TokenStream2 {
    let krate = crate_path();
    let Some(last) = parent.segments.last() else {
        return quote! { #parent };
    };
    let is_root_crate = parent.segments.len() == 1
        || parent
            .segments
            .first()
            .is_some_and(|s| s.ident == "cocom" || s.ident == "crate");
    if is_root_crate && (last.ident == "IUnknown" || last.ident == "IWeak") {
        let name = format_ident!("{}Impl", last.ident);
        return quote! { #krate::#name };
    }

    let mut path = parent.clone();
    if let Some(last) = path.segments.last_mut() {
        last.ident = format_ident!("{}Impl", last.ident);
    }
    quote! { #path }
}

// =============================================================================
// GUID parsing
// =============================================================================

/// Parse a GUID string in format "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx".
/// Returns (data1, data2, data3, data4).
fn parse_guid_string(s: &str) -> Result<(u32, u16, u16, [u8; 8]), String> {
    if s.len() != 36 {
        return Err(format!(
            "invalid GUID '{s}': expected 36 characters in the form xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx"
        ));
    }
    for (i, c) in s.char_indices() {
        let is_dash = matches!(i, 8 | 13 | 18 | 23);
        if is_dash && c != '-' {
            return Err(format!("invalid GUID '{s}': expected '-' at position {i}"));
        }
        if !is_dash && !c.is_ascii_hexdigit() {
            return Err(format!("invalid GUID '{s}': '{c}' at position {i} is not a hex digit"));
        }
    }

    let hex: String = s.chars().filter(|c| *c != '-').collect();
    let byte = |i: usize| u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16);
    let mut bytes = [0u8; 16];
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = byte(i).map_err(|e| format!("invalid GUID '{s}': {e}"))?;
    }

    let data1 = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let data2 = u16::from_be_bytes([bytes[4], bytes[5]]);
    let data3 = u16::from_be_bytes([bytes[6], bytes[7]]);
    let mut data4 = [0u8; 8];
    data4.copy_from_slice(&bytes[8..]);
    Ok((data1, data2, data3, data4))
}

// =============================================================================
// #[interface]
// =============================================================================

struct MethodInfo {
    slot: usize,
    name: Ident,
    attrs: Vec<Attribute>,
    param_names: Vec<Ident>,
    param_types: Vec<Type>,
    output: syn::ReturnType,
}

fn interface_internal(guid: LitStr, input: ItemTrait) -> Result<TokenStream2, syn::Error> {
    let parent = validate_trait(&input)?;
    let (data1, data2, data3, data4) =
        parse_guid_string(&guid.value()).map_err(|e| syn::Error::new(guid.span(), e))?;

    let krate = crate_path();
    let name = &input.ident;
    let name_str = name.to_string();
    let vis = &input.vis;
    let vtable_name = format_ident!("{}VTable", name);
    let impl_name = format_ident!("{}Impl", name);
    let parent_impl = impl_trait_path(&parent);
    let iid_name = format_ident!("IID_{}", name_str.to_uppercase());
    let doc_attrs: Vec<_> = input
        .attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .collect();

    // Collect methods with their slot indices (relative to the first own slot)
    let mut methods: Vec<MethodInfo> = Vec::new();
    let mut impl_items = Vec::new();
    let mut next_slot = 0usize;

    for item in &input.items {
        let TraitItem::Fn(method) = item else {
            continue;
        };
        let method_name = method.sig.ident.clone();

        let slot = match parse_slot_attr(&method.attrs)? {
            Some(explicit_slot) if explicit_slot < next_slot => {
                return Err(syn::Error::new(
                    method_name.span(),
                    format!(
                        "slot({explicit_slot}) for method '{method_name}' would overlap with previous slots (next available: {next_slot})"
                    ),
                ));
            }
            Some(explicit_slot) => explicit_slot,
            None => next_slot,
        };
        next_slot = slot + 1;

        let params: Vec<_> = method
            .sig
            .inputs
            .iter()
            .filter_map(|arg| {
                if let FnArg::Typed(pat_type) = arg
                    && let Pat::Ident(pat_ident) = pat_type.pat.as_ref()
                {
                    return Some((pat_ident.ident.clone(), pat_type.ty.as_ref().clone()));
                }
                None
            })
            .collect();

        let attrs: Vec<Attribute> = method
            .attrs
            .iter()
            .filter(|a| !a.path().is_ident("slot"))
            .cloned()
            .collect();

        let mut impl_method = method.clone();
        impl_method.attrs = attrs.clone();
        impl_items.push(impl_method);

        methods.push(MethodInfo {
            slot,
            name: method_name,
            attrs,
            param_names: params.iter().map(|(n, _)| n.clone()).collect(),
            param_types: params.into_iter().map(|(_, t)| t).collect(),
            output: method.sig.output.clone(),
        });
    }

    let mut vtable_fields = Vec::new();
    let mut wrapper_methods = Vec::new();
    let mut thunks = Vec::new();
    let mut bind_fields = Vec::new();
    let mut current_slot = 0usize;

    for method in &methods {
        // Fill gaps with reserved entries
        while current_slot < method.slot {
            let reserved = format_ident!("__reserved_slot_{}", current_slot);
            vtable_fields.push(quote! {
                #[doc(hidden)]
                pub #reserved: unsafe extern "C" fn(this: *const #name)
            });
            bind_fields.push(quote! { #reserved: #vtable_name::reserved_slot });
            current_slot += 1;
        }

        let MethodInfo {
            name: method_name,
            attrs,
            param_names,
            param_types,
            output,
            ..
        } = method;
        let thunk_name = format_ident!("thunk_{}", method_name);

        vtable_fields.push(quote! {
            pub #method_name: unsafe extern "C" fn(
                this: *const #name
                #(, #param_names: #param_types)*
            ) #output
        });

        wrapper_methods.push(quote! {
            #(#attrs)*
            #[inline]
            pub fn #method_name(&self #(, #param_names: #param_types)*) #output {
                unsafe {
                    (<Self as #krate::Interface>::vtable(self).#method_name)(
                        self
                        #(, #param_names)*
                    )
                }
            }
        });

        thunks.push(quote! {
            #[doc(hidden)]
            pub unsafe extern "C" fn #thunk_name<O>(
                this: *const #name
                #(, #param_names: #param_types)*
            ) #output
            where
                O: #krate::Outer,
                O::Value: #impl_name,
            {
                let outer = unsafe { &*<O as #krate::Outer>::from_interface(this.cast()) };
                <O::Value as #impl_name>::#method_name(
                    <O as #krate::Outer>::value(outer)
                    #(, #param_names)*
                )
            }
        });

        bind_fields.push(quote! { #method_name: #vtable_name::#thunk_name::<O> });

        current_slot += 1;
    }

    let own_slots = current_slot;
    let has_reserved = own_slots > methods.len();
    let reserved_thunk = has_reserved.then(|| {
        let message = format!("reserved vtable slot of {name_str} called");
        quote! {
            #[doc(hidden)]
            pub unsafe extern "C" fn reserved_slot(_this: *const #name) {
                panic!(#message)
            }
        }
    });

    let expanded = quote! {
        #(#doc_attrs)*
        #[repr(C)]
        #vis struct #name {
            base: #parent,
        }

        #[doc = concat!("Vtable of [`", #name_str, "`].")]
        #[repr(C)]
        #vis struct #vtable_name {
            /// Inherited parent vtable
            pub base: <#parent as #krate::VTableLayout>::VTable,
            #(#vtable_fields,)*
        }

        #[doc = concat!("Interface identifier of [`", #name_str, "`].")]
        #vis const #iid_name: #krate::Guid =
            #krate::Guid::from_fields(#data1, #data2, #data3, [#(#data4),*]);

        unsafe impl #krate::VTableLayout for #name {
            const SLOT_COUNT: usize = <#parent as #krate::VTableLayout>::SLOT_COUNT + #own_slots;
            type VTable = #vtable_name;
        }

        const _: () = assert!(
            ::core::mem::size_of::<#vtable_name>()
                == <#name as #krate::VTableLayout>::SLOT_COUNT * ::core::mem::size_of::<usize>()
        );

        unsafe impl #krate::Interface for #name {
            const GUID: #krate::Guid = #iid_name;
            const NAME: &'static str = #name_str;
            type Parent = #parent;
            type Counting = <#parent as #krate::Interface>::Counting;

            fn query_chain(
                this: ::core::ptr::NonNull<#krate::c_void>,
                guid: &#krate::Guid,
            ) -> ::core::result::Result<::core::ptr::NonNull<#krate::c_void>, #krate::HResult> {
                if *guid == #iid_name {
                    ::core::result::Result::Ok(this)
                } else {
                    <#parent as #krate::Interface>::query_chain(this, guid)
                }
            }
        }

        unsafe impl ::core::marker::Send for #name {}
        unsafe impl ::core::marker::Sync for #name {}

        impl ::core::ops::Deref for #name {
            type Target = #parent;

            #[inline]
            fn deref(&self) -> &#parent {
                &self.base
            }
        }

        impl ::core::fmt::Debug for #name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.debug_struct(#name_str)
                    .field("vtable", &(<Self as #krate::Interface>::vtable(self) as *const #vtable_name))
                    .finish()
            }
        }

        impl #name {
            #(#wrapper_methods)*
        }

        #(#doc_attrs)*
        #vis trait #impl_name: #parent_impl {
            #(#impl_items)*
        }

        impl #vtable_name {
            #(#thunks)*
            #reserved_thunk
        }

        unsafe impl<O> #krate::Bind<O> for #name
        where
            O: #krate::Outer,
            #parent: #krate::Bind<O>,
            O::Value: #impl_name,
        {
            fn build() -> #vtable_name {
                #vtable_name {
                    base: <#parent as #krate::Bind<O>>::build(),
                    #(#bind_fields,)*
                }
            }
        }
    };

    Ok(expanded)
}

/// Define an interface.
///
/// The attribute argument is the interface GUID. The trait must extend exactly
/// one parent interface (`IUnknown`, `IWeak` or another `#[interface]`).
///
/// # Example
/// ```ignore
/// #[interface("c523bd17-e326-446c-8aab-c4e40774531a")]
/// pub trait ITest1: IUnknown {
///     fn add(&self, a: u32, b: u32) -> u32;
///     #[slot(3)]
///     fn later(&self);  // own slots 1-2 are reserved
/// }
/// ```
#[proc_macro_attribute]
pub fn interface(attr: TokenStream, item: TokenStream) -> TokenStream {
    let guid = parse_macro_input!(attr as LitStr);
    let input = parse_macro_input!(item as ItemTrait);
    match interface_internal(guid, input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

// =============================================================================
// #[object]
// =============================================================================

fn object_internal(interface: Path, item: Item) -> Result<TokenStream2, syn::Error> {
    let krate = crate_path();
    let (ident, generics) = match &item {
        Item::Struct(s) => (&s.ident, &s.generics),
        Item::Enum(e) => (&e.ident, &e.generics),
        other => {
            return Err(syn::Error::new(
                other.span(),
                "#[object] can only be applied to a struct or enum",
            ));
        }
    };
    let (impl_generics, type_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        #item

        impl #impl_generics #krate::Object for #ident #type_generics #where_clause {
            type Interface = #interface;
        }
    })
}

/// Declare the most-derived interface an implementation type exposes.
///
/// The type must implement the interface's `Impl` trait and those of all its
/// ancestors, and be `Send + Sync + 'static`.
///
/// # Example
/// ```ignore
/// #[object(ITest2)]
/// struct Test2 { foo: AtomicU32 }
///
/// impl ITest1Impl for Test2 { /* ... */ }
/// impl ITest2Impl for Test2 { /* ... */ }
///
/// let obj: StrongRef<ITest2> = ComObject::new(Test2 { foo: AtomicU32::new(0) });
/// ```
#[proc_macro_attribute]
pub fn object(attr: TokenStream, item: TokenStream) -> TokenStream {
    let interface = parse_macro_input!(attr as Path);
    let item = parse_macro_input!(item as Item);
    match object_internal(interface, item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proc_macro2::Span;
    use syn::parse_quote;

    const GUID: &str = "c523bd17-e326-446c-8aab-c4e40774531a";

    fn expand(item: ItemTrait) -> Result<TokenStream2, syn::Error> {
        interface_internal(LitStr::new(GUID, Span::call_site()), item)
    }

    fn expect_error(item: ItemTrait, needle: &str) {
        let err = expand(item).unwrap_err().to_string();
        assert!(err.contains(needle), "unexpected error: {err}");
    }

    #[test]
    fn test_parse_guid_string() {
        let (d1, d2, d3, d4) = parse_guid_string(GUID).unwrap();
        assert_eq!(d1, 0xc523bd17);
        assert_eq!(d2, 0xe326);
        assert_eq!(d3, 0x446c);
        assert_eq!(d4, [0x8a, 0xab, 0xc4, 0xe4, 0x07, 0x74, 0x53, 0x1a]);
    }

    #[test]
    fn test_parse_guid_string_rejects_malformed() {
        assert!(parse_guid_string("c523bd17-e326-446c-8aab").is_err());
        assert!(parse_guid_string("c523bd17xe326-446c-8aab-c4e40774531a").is_err());
        assert!(parse_guid_string("g523bd17-e326-446c-8aab-c4e40774531a").is_err());
    }

    #[test]
    fn test_valid_interface_expands() {
        let tokens = expand(parse_quote! {
            pub trait ICalc: IUnknown {
                fn add(&self, a: u32, b: u32) -> u32;
            }
        })
        .unwrap()
        .to_string();
        assert!(tokens.contains("ICalcVTable"));
        assert!(tokens.contains("ICalcImpl"));
        assert!(tokens.contains("IID_ICALC"));
        assert!(tokens.contains("thunk_add"));
    }

    #[test]
    fn test_root_impl_trait_is_qualified() {
        let parent: Path = parse_quote!(IUnknown);
        assert_eq!(
            impl_trait_path(&parent).to_string(),
            quote!(::cocom::IUnknownImpl).to_string()
        );
        let parent: Path = parse_quote!(super::ITest1);
        assert_eq!(
            impl_trait_path(&parent).to_string(),
            quote!(super::ITest1Impl).to_string()
        );
    }

    #[test]
    fn test_rejects_missing_parent() {
        expect_error(
            parse_quote! {
                pub trait IOrphan {
                    fn f(&self);
                }
            },
            "must extend exactly one parent",
        );
    }

    #[test]
    fn test_rejects_multiple_parents() {
        expect_error(
            parse_quote! {
                pub trait IBoth: IUnknown + IWeak {
                    fn f(&self);
                }
            },
            "single inheritance",
        );
    }

    #[test]
    fn test_rejects_mut_self() {
        expect_error(
            parse_quote! {
                pub trait IMut: IUnknown {
                    fn set(&mut self, v: u32);
                }
            },
            "&mut self is not supported",
        );
    }

    #[test]
    fn test_rejects_missing_receiver() {
        expect_error(
            parse_quote! {
                pub trait IStatic: IUnknown {
                    fn make() -> u32;
                }
            },
            "must take &self",
        );
    }

    #[test]
    fn test_rejects_non_ffi_types() {
        expect_error(
            parse_quote! {
                pub trait IName: IUnknown {
                    fn name(&self) -> String;
                }
            },
            "String is not FFI-safe",
        );
        expect_error(
            parse_quote! {
                pub trait IRef: IUnknown {
                    fn read(&self, out: &mut u32);
                }
            },
            "references are not allowed",
        );
    }

    #[test]
    fn test_rejects_async_and_generics() {
        expect_error(
            parse_quote! {
                pub trait IAsync: IUnknown {
                    async fn run(&self);
                }
            },
            "async functions are not supported",
        );
        expect_error(
            parse_quote! {
                pub trait IGeneric: IUnknown {
                    fn run<T>(&self, t: *const T);
                }
            },
            "generic methods are not supported",
        );
    }

    #[test]
    fn test_rejects_overlapping_slots() {
        expect_error(
            parse_quote! {
                pub trait ISlots: IUnknown {
                    #[slot(2)]
                    fn a(&self);
                    #[slot(1)]
                    fn b(&self);
                }
            },
            "would overlap",
        );
    }

    #[test]
    fn test_explicit_slot_reserves_gap() {
        let tokens = expand(parse_quote! {
            pub trait IGap: IUnknown {
                fn a(&self);
                #[slot(3)]
                fn b(&self);
            }
        })
        .unwrap()
        .to_string();
        assert!(tokens.contains("__reserved_slot_1"));
        assert!(tokens.contains("__reserved_slot_2"));
        assert!(!tokens.contains("__reserved_slot_3"));
    }

    #[test]
    fn test_object_rejects_functions() {
        let item: Item = parse_quote! { fn not_a_type() {} };
        assert!(object_internal(parse_quote!(ICalc), item).is_err());
    }
}
