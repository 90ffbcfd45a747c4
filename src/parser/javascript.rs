use crate::model::{BindingScope, Framework, FrameworkHint, SymbolKind, TriggerSpec};
use crate::parser::facts::{
    CallSiteFact, DiDraft, FileFacts, ImportFact, JobDraft, ProviderFact, RouteDraft, SymbolFact,
};
use crate::parser::http;
use anyhow::Result;
use tree_sitter::{Node, Parser};

const HTTP_METHOD_NAMES: &[&str] = &[
    "get", "post", "put", "delete", "patch", "head", "options", "all",
];
const ROUTER_RECEIVERS: &[&str] = &["app", "router", "server", "api"];
const NEXT_HANDLER_EXPORTS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

#[derive(Clone)]
struct Context {
    class_stack: Vec<String>,
    fn_depth: usize,
    current_scope: Option<String>,
    exported: bool,
    /// `@Controller` path prefix while inside that class body.
    route_prefix: Option<String>,
    /// Class-level guard/interceptor refs inherited by method routes.
    class_middleware: Vec<String>,
    /// Class carries Nest decorators, so constructor params are injected.
    di_class: bool,
}

impl Context {
    fn top() -> Self {
        Context {
            class_stack: Vec::new(),
            fn_depth: 0,
            current_scope: None,
            exported: false,
            route_prefix: None,
            class_middleware: Vec::new(),
            di_class: false,
        }
    }
}

pub struct JavascriptExtractor {
    parser: Parser,
}

pub struct TypescriptExtractor {
    parser: Parser,
}

pub struct TsxExtractor {
    parser: Parser,
}

impl JavascriptExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_javascript::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

impl TypescriptExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_typescript::LANGUAGE_TYPESCRIPT;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

impl TsxExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_typescript::LANGUAGE_TSX;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

impl crate::parser::Extractor for JavascriptExtractor {
    fn extract(&mut self, source: &str, facts: &mut FileFacts, hint: FrameworkHint) -> Result<()> {
        extract_with_parser(&mut self.parser, source, facts, hint)
    }
}

impl crate::parser::Extractor for TypescriptExtractor {
    fn extract(&mut self, source: &str, facts: &mut FileFacts, hint: FrameworkHint) -> Result<()> {
        extract_with_parser(&mut self.parser, source, facts, hint)
    }
}

impl crate::parser::Extractor for TsxExtractor {
    fn extract(&mut self, source: &str, facts: &mut FileFacts, hint: FrameworkHint) -> Result<()> {
        extract_with_parser(&mut self.parser, source, facts, hint)
    }
}

fn extract_with_parser(
    parser: &mut Parser,
    source: &str,
    facts: &mut FileFacts,
    hint: FrameworkHint,
) -> Result<()> {
    let tree = match parser.parse(source, None) {
        Some(tree) => tree,
        None => {
            facts.mark_failed("parser produced no tree");
            return Ok(());
        }
    };
    let root = tree.root_node();
    if root.has_error() {
        facts.mark_failed("syntax error");
        return Ok(());
    }
    let mut walker = Walker {
        source,
        hint,
        commonjs_exports: Vec::new(),
    };
    walker.walk_node(root, &Context::top(), facts);
    for name in &walker.commonjs_exports {
        for symbol in &mut facts.symbols {
            if &symbol.name == name {
                symbol.exported = true;
            }
        }
    }
    if hint.allows(Framework::Nextjs) {
        push_next_routes(facts);
    }
    Ok(())
}

struct Walker<'a> {
    source: &'a str,
    hint: FrameworkHint,
    /// Names assigned through `module.exports`/`exports.*`.
    commonjs_exports: Vec<String>,
}

impl Walker<'_> {
    fn walk_node(&mut self, node: Node<'_>, ctx: &Context, out: &mut FileFacts) {
        if node.kind() == "call_expression" || node.kind() == "new_expression" {
            self.handle_call(node, ctx, out);
        }
        if node.kind() == "assignment_expression" {
            self.collect_commonjs_exports(node);
        }
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" => {
                self.handle_class(node, ctx, out);
                return;
            }
            "function_declaration" | "generator_function_declaration" => {
                self.handle_function(node, ctx, out);
                return;
            }
            "lexical_declaration" | "variable_declaration" => {
                self.handle_variable_declaration(node, ctx, out);
                return;
            }
            "import_statement" => {
                if ctx.fn_depth == 0 {
                    self.handle_import_statement(node, out);
                }
                return;
            }
            "export_statement" => {
                self.handle_export_statement(node, ctx, out);
                return;
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.walk_node(child, ctx, out);
        }
    }

    fn handle_export_statement(&mut self, node: Node<'_>, ctx: &Context, out: &mut FileFacts) {
        // Re-exports (`export { x } from "./mod"`) behave like imports for
        // resolution purposes.
        if let Some(source_node) = node.child_by_field_name("source") {
            let raw = node_text(source_node, self.source);
            if let Some(specifier) = unquote_string_literal(&raw) {
                let line = span(node).0;
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() != "export_clause" {
                        continue;
                    }
                    let mut inner = child.walk();
                    for spec in child.named_children(&mut inner) {
                        if spec.kind() != "export_specifier" {
                            continue;
                        }
                        let Some(name_node) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        let name = node_text(name_node, self.source);
                        let alias = spec
                            .child_by_field_name("alias")
                            .map(|n| node_text(n, self.source))
                            .unwrap_or_else(|| name.clone());
                        out.imports.push(ImportFact {
                            specifier: specifier.clone(),
                            imported: Some(name),
                            local_name: Some(alias),
                            line,
                        });
                    }
                }
            }
            return;
        }

        let is_default = has_token_child(node, "default");
        let mut next_ctx = ctx.clone();
        next_ctx.exported = true;
        if let Some(declaration) = node.child_by_field_name("declaration") {
            let before = out.symbols.len();
            self.walk_node(declaration, &next_ctx, out);
            if is_default && out.default_export.is_none() {
                if let Some(symbol) = out.symbols.get(before) {
                    out.default_export = Some(symbol.qualname.clone());
                }
            }
            return;
        }
        if is_default {
            // `export default handler;`
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "identifier" {
                    out.default_export = Some(node_text(child, self.source));
                    return;
                }
            }
        }
    }

    fn handle_class(&mut self, node: Node<'_>, ctx: &Context, out: &mut FileFacts) {
        if ctx.fn_depth > 0 {
            return;
        }
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source);
        if name.is_empty() {
            return;
        }
        let qualname = build_qualname(&ctx.class_stack, &name);
        let (start_line, end_line) = span(node);
        out.symbols.push(SymbolFact {
            qualname: qualname.clone(),
            name: name.clone(),
            kind: SymbolKind::Class,
            start_line,
            end_line,
            exported: ctx.exported,
            signature: None,
        });

        let mut next_ctx = ctx.clone();
        next_ctx.class_stack.push(name);
        next_ctx.current_scope = Some(qualname.clone());
        next_ctx.exported = false;
        next_ctx.route_prefix = None;
        next_ctx.class_middleware = Vec::new();
        next_ctx.di_class = false;
        if self.hint.allows(Framework::Nestjs) {
            for decorator in decorator_nodes(node) {
                let Some((dec_name, args)) = decorator_name_and_args(decorator, self.source)
                else {
                    continue;
                };
                match dec_name.as_str() {
                    "Controller" => {
                        let prefix = args
                            .first()
                            .and_then(|arg| extract_string_literal(*arg, self.source))
                            .unwrap_or_else(|| "/".to_string());
                        next_ctx.route_prefix = Some(prefix);
                        next_ctx.di_class = true;
                    }
                    "Injectable" => {
                        out.providers.push(ProviderFact {
                            qualname: qualname.clone(),
                            scope: injectable_scope(args.first(), self.source),
                        });
                        next_ctx.di_class = true;
                    }
                    "UseGuards" | "UseInterceptors" => {
                        next_ctx
                            .class_middleware
                            .extend(reference_args(&args, self.source));
                    }
                    _ => {}
                }
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_class_body(body, &next_ctx, out);
        }
    }

    fn walk_class_body(&mut self, node: Node<'_>, ctx: &Context, out: &mut FileFacts) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "method_definition" {
                self.handle_method(child, ctx, out);
            }
        }
    }

    fn handle_method(&mut self, node: Node<'_>, ctx: &Context, out: &mut FileFacts) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source);
        if name.is_empty() {
            return;
        }
        let qualname = build_qualname(&ctx.class_stack, &name);
        let (start_line, end_line) = span(node);

        let mut routes = Vec::new();
        if self.hint.allows(Framework::Nestjs) {
            routes = self.method_route_drafts(node, &qualname, ctx);
            out.jobs
                .extend(self.method_job_drafts(node, &qualname));
        }
        let kind = if routes.is_empty() {
            SymbolKind::Method
        } else {
            SymbolKind::RouteHandler
        };
        out.routes.append(&mut routes);

        out.symbols.push(SymbolFact {
            qualname: qualname.clone(),
            name: name.clone(),
            kind,
            start_line,
            end_line,
            // Methods on an exported class are reachable through it.
            exported: true,
            signature: extract_signature(node, self.source),
        });

        if name == "constructor" && ctx.di_class && self.hint.allows(Framework::Nestjs) {
            self.constructor_di_drafts(node, ctx, out);
        }

        if let Some(body) = node.child_by_field_name("body") {
            let mut next_ctx = ctx.clone();
            next_ctx.fn_depth += 1;
            next_ctx.current_scope = Some(qualname);
            self.walk_node(body, &next_ctx, out);
        }
    }

    fn method_route_drafts(
        &self,
        node: Node<'_>,
        qualname: &str,
        ctx: &Context,
    ) -> Vec<RouteDraft> {
        let mut drafts = Vec::new();
        let mut method_middleware = Vec::new();
        let mut endpoints = Vec::new();
        for decorator in decorator_nodes(node) {
            let Some((name, args)) = decorator_name_and_args(decorator, self.source) else {
                continue;
            };
            match name.as_str() {
                "Get" | "Post" | "Put" | "Delete" | "Patch" | "Head" | "Options" | "All" => {
                    let raw = args
                        .first()
                        .and_then(|arg| extract_string_literal(*arg, self.source))
                        .unwrap_or_else(|| "/".to_string());
                    endpoints.push((http::normalize_method(&name), raw));
                }
                "UseGuards" | "UseInterceptors" => {
                    method_middleware.extend(reference_args(&args, self.source));
                }
                _ => {}
            }
        }
        let line = span(node).0;
        for (method, raw) in endpoints {
            let prefix = ctx.route_prefix.as_deref().unwrap_or("/");
            let mut middleware = ctx.class_middleware.clone();
            middleware.extend(method_middleware.iter().cloned());
            drafts.push(RouteDraft {
                method,
                path: http::join_paths(prefix, &raw),
                handler: qualname.to_string(),
                middleware,
                framework: Framework::Nestjs,
                line,
            });
        }
        drafts
    }

    fn method_job_drafts(&self, node: Node<'_>, qualname: &str) -> Vec<JobDraft> {
        let mut drafts = Vec::new();
        for decorator in decorator_nodes(node) {
            let Some((name, args)) = decorator_name_and_args(decorator, self.source) else {
                continue;
            };
            let line = span(node).0;
            let first_arg = args
                .first()
                .and_then(|arg| extract_string_literal(*arg, self.source));
            let trigger = match name.as_str() {
                "Cron" => {
                    let Some(expr) = first_arg else { continue };
                    TriggerSpec::Cron { expr }
                }
                "Interval" => {
                    let ms = args
                        .first()
                        .map(|arg| node_text(*arg, self.source))
                        .unwrap_or_default();
                    TriggerSpec::Cron {
                        expr: format!("interval {ms}"),
                    }
                }
                "Timeout" => TriggerSpec::Event {
                    name: "timeout".to_string(),
                },
                "OnEvent" => {
                    let Some(event) = first_arg else { continue };
                    TriggerSpec::Event { name: event }
                }
                _ => continue,
            };
            drafts.push(JobDraft {
                name: qualname.to_string(),
                trigger,
                handler: qualname.to_string(),
                line,
            });
        }
        drafts
    }

    /// Constructor parameters with type annotations are provider references:
    /// `constructor(private readonly users: UserService)`.
    fn constructor_di_drafts(&self, node: Node<'_>, ctx: &Context, out: &mut FileFacts) {
        let Some(params) = node.child_by_field_name("parameters") else {
            return;
        };
        let consumer = ctx.class_stack.join(".");
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if !matches!(param.kind(), "required_parameter" | "optional_parameter") {
                continue;
            }
            let Some(type_node) = param.child_by_field_name("type") else {
                continue;
            };
            let provider = type_text(type_node, self.source);
            if provider.is_empty() || !is_simple_reference(&provider) {
                continue;
            }
            out.di.push(DiDraft {
                provider,
                consumer: consumer.clone(),
                scope: BindingScope::Singleton,
                line: span(param).0,
            });
        }
    }

    fn handle_function(&mut self, node: Node<'_>, ctx: &Context, out: &mut FileFacts) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source);
        if name.is_empty() {
            return;
        }
        if ctx.fn_depth > 0 {
            // Nested helpers are not symbols of their own, but their calls
            // still belong to the enclosing one.
            if let Some(body) = node.child_by_field_name("body") {
                let mut next_ctx = ctx.clone();
                next_ctx.fn_depth += 1;
                self.walk_node(body, &next_ctx, out);
            }
            return;
        }
        let qualname = build_qualname(&ctx.class_stack, &name);
        let (start_line, end_line) = span(node);
        out.symbols.push(SymbolFact {
            qualname: qualname.clone(),
            name,
            kind: SymbolKind::Function,
            start_line,
            end_line,
            exported: ctx.exported,
            signature: extract_signature(node, self.source),
        });
        if let Some(body) = node.child_by_field_name("body") {
            let mut next_ctx = ctx.clone();
            next_ctx.fn_depth += 1;
            next_ctx.current_scope = Some(qualname);
            next_ctx.exported = false;
            self.walk_node(body, &next_ctx, out);
        }
    }

    fn handle_variable_declaration(&mut self, node: Node<'_>, ctx: &Context, out: &mut FileFacts) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = child.child_by_field_name("name") else {
                continue;
            };
            let value = child.child_by_field_name("value");

            // `const svc = require("./svc")` and destructured variants.
            if ctx.fn_depth == 0 {
                if let Some(value) = value {
                    if let Some(specifier) = require_specifier(value, self.source) {
                        self.push_require_imports(name_node, &specifier, span(child).0, out);
                        continue;
                    }
                }
            }

            let name = node_text(name_node, self.source);
            if name.is_empty() {
                continue;
            }
            let Some(value) = value else {
                continue;
            };
            if ctx.fn_depth == 0
                && ctx.class_stack.is_empty()
                && matches!(
                    value.kind(),
                    "arrow_function" | "function_expression" | "function"
                )
            {
                let qualname = name.clone();
                let (start_line, end_line) = span(child);
                out.symbols.push(SymbolFact {
                    qualname: qualname.clone(),
                    name,
                    kind: SymbolKind::Function,
                    start_line,
                    end_line,
                    exported: ctx.exported,
                    signature: extract_signature(value, self.source),
                });
                if let Some(body) = value.child_by_field_name("body") {
                    let mut next_ctx = ctx.clone();
                    next_ctx.fn_depth += 1;
                    next_ctx.current_scope = Some(qualname);
                    self.walk_node(body, &next_ctx, out);
                }
                continue;
            }
            // Other initializers may still register routes or contain calls.
            self.walk_node(value, ctx, out);
        }
    }

    fn push_require_imports(
        &mut self,
        name_node: Node<'_>,
        specifier: &str,
        line: u32,
        out: &mut FileFacts,
    ) {
        match name_node.kind() {
            "identifier" => {
                out.imports.push(ImportFact {
                    specifier: specifier.to_string(),
                    imported: None,
                    local_name: Some(node_text(name_node, self.source)),
                    line,
                });
            }
            "object_pattern" => {
                let mut cursor = name_node.walk();
                for prop in name_node.named_children(&mut cursor) {
                    let (imported, local) = match prop.kind() {
                        "shorthand_property_identifier_pattern" => {
                            let name = node_text(prop, self.source);
                            (name.clone(), name)
                        }
                        "pair_pattern" => {
                            let Some(key) = prop.child_by_field_name("key") else {
                                continue;
                            };
                            let Some(value) = prop.child_by_field_name("value") else {
                                continue;
                            };
                            (
                                node_text(key, self.source),
                                node_text(value, self.source),
                            )
                        }
                        _ => continue,
                    };
                    out.imports.push(ImportFact {
                        specifier: specifier.to_string(),
                        imported: Some(imported),
                        local_name: Some(local),
                        line,
                    });
                }
            }
            _ => {}
        }
    }

    fn handle_import_statement(&mut self, node: Node<'_>, out: &mut FileFacts) {
        let Some(source_node) = node.child_by_field_name("source") else {
            return;
        };
        let raw = node_text(source_node, self.source);
        let Some(specifier) = unquote_string_literal(&raw) else {
            return;
        };
        let line = span(node).0;
        let mut bound = false;
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "import_clause" {
                continue;
            }
            let mut inner = child.walk();
            for clause in child.named_children(&mut inner) {
                match clause.kind() {
                    "identifier" => {
                        bound = true;
                        out.imports.push(ImportFact {
                            specifier: specifier.clone(),
                            imported: Some("default".to_string()),
                            local_name: Some(node_text(clause, self.source)),
                            line,
                        });
                    }
                    "namespace_import" => {
                        let mut ns_cursor = clause.walk();
                        for ns_child in clause.named_children(&mut ns_cursor) {
                            if ns_child.kind() == "identifier" {
                                bound = true;
                                out.imports.push(ImportFact {
                                    specifier: specifier.clone(),
                                    imported: None,
                                    local_name: Some(node_text(ns_child, self.source)),
                                    line,
                                });
                            }
                        }
                    }
                    "named_imports" => {
                        let mut named_cursor = clause.walk();
                        for spec in clause.named_children(&mut named_cursor) {
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            let Some(name_node) = spec.child_by_field_name("name") else {
                                continue;
                            };
                            let name = node_text(name_node, self.source);
                            let alias = spec
                                .child_by_field_name("alias")
                                .map(|n| node_text(n, self.source))
                                .unwrap_or_else(|| name.clone());
                            bound = true;
                            out.imports.push(ImportFact {
                                specifier: specifier.clone(),
                                imported: Some(name),
                                local_name: Some(alias),
                                line,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        if !bound {
            out.imports.push(ImportFact {
                specifier,
                imported: None,
                local_name: None,
                line,
            });
        }
    }

    fn handle_call(&mut self, node: Node<'_>, ctx: &Context, out: &mut FileFacts) {
        if self.hint.allows(Framework::Express) {
            if let Some(draft) = self.express_direct_route(node, ctx) {
                out.routes.push(draft);
            }
            if let Some(draft) = self.express_chain_route(node, ctx) {
                out.routes.push(draft);
            }
        }
        let Some(scope) = ctx.current_scope.as_ref() else {
            return;
        };
        let Some(target_node) = call_target_node(node) else {
            return;
        };
        let raw = node_text(target_node, self.source);
        let Some(reference) = resolve_reference(&raw, ctx) else {
            return;
        };
        out.calls.push(CallSiteFact {
            caller: scope.clone(),
            reference,
            line: span(node).0,
        });
    }

    /// `app.get("/users/:id", auth, handler)` on a known router receiver.
    fn express_direct_route(&self, node: Node<'_>, ctx: &Context) -> Option<RouteDraft> {
        let target_node = call_target_node(node)?;
        let (receiver, method_name) = member_receiver_and_method(target_node, self.source)?;
        if !HTTP_METHOD_NAMES.contains(&method_name.as_str()) || !is_router_receiver(&receiver) {
            return None;
        }
        let args = call_arguments(node);
        let raw_path = args
            .first()
            .and_then(|arg| extract_string_literal(*arg, self.source))?;
        let (middleware, handler) = self.middleware_and_handler(&args[1..], ctx);
        Some(RouteDraft {
            method: http::normalize_method(&method_name),
            path: http::normalize_path(&raw_path),
            handler,
            middleware,
            framework: Framework::Express,
            line: span(node).0,
        })
    }

    /// `router.route("/users").get(handler)` chains.
    fn express_chain_route(&self, node: Node<'_>, ctx: &Context) -> Option<RouteDraft> {
        let target_node = call_target_node(node)?;
        let (object_node, method_name) = member_object_and_method(target_node, self.source)?;
        if !HTTP_METHOD_NAMES.contains(&method_name.as_str()) {
            return None;
        }
        if object_node.kind() != "call_expression" {
            return None;
        }
        let route_target = call_target_node(object_node)?;
        let (_, route_method) = member_receiver_and_method(route_target, self.source)?;
        if route_method != "route" {
            return None;
        }
        let route_args = call_arguments(object_node);
        let raw_path = route_args
            .first()
            .and_then(|arg| extract_string_literal(*arg, self.source))?;
        let args = call_arguments(node);
        let (middleware, handler) = self.middleware_and_handler(&args, ctx);
        Some(RouteDraft {
            method: http::normalize_method(&method_name),
            path: http::normalize_path(&raw_path),
            handler,
            middleware,
            framework: Framework::Express,
            line: span(node).0,
        })
    }

    /// Trailing argument is the handler; named arguments before it act as
    /// middleware. Inline closures cannot be referenced and stay anonymous.
    fn middleware_and_handler(
        &self,
        args: &[Node<'_>],
        ctx: &Context,
    ) -> (Vec<String>, String) {
        let mut refs: Vec<Option<String>> = args
            .iter()
            .map(|arg| self.reference_from_node(*arg, ctx))
            .collect();
        let handler = refs
            .pop()
            .flatten()
            .unwrap_or_else(|| "<anonymous>".to_string());
        let middleware = refs.into_iter().flatten().collect();
        (middleware, handler)
    }

    fn reference_from_node(&self, node: Node<'_>, ctx: &Context) -> Option<String> {
        match node.kind() {
            "identifier" | "member_expression" | "optional_member_expression" => {
                let raw = node_text(node, self.source);
                resolve_reference(&raw, ctx)
            }
            _ => None,
        }
    }

    fn collect_commonjs_exports(&mut self, node: Node<'_>) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        let left_text = node_text(left, self.source);
        let Some(right) = node.child_by_field_name("right") else {
            return;
        };
        if left_text == "module.exports" {
            match right.kind() {
                "identifier" => self.commonjs_exports.push(node_text(right, self.source)),
                "object" => {
                    let mut cursor = right.walk();
                    for child in right.named_children(&mut cursor) {
                        match child.kind() {
                            "shorthand_property_identifier" => {
                                self.commonjs_exports.push(node_text(child, self.source));
                            }
                            "pair" => {
                                if let Some(value) = child.child_by_field_name("value") {
                                    if value.kind() == "identifier" {
                                        self.commonjs_exports
                                            .push(node_text(value, self.source));
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        } else if let Some(name) = left_text.strip_prefix("exports.") {
            if is_simple_reference(name) {
                self.commonjs_exports.push(name.to_string());
            }
        }
    }
}

/// Routes carried by file position: `app/**/route.*`, `app/**/page.*`, and
/// `pages/api/**`. App-router API files export one handler per HTTP method,
/// page files serve GET through their default-export component, and
/// pages-router API files export a default handler serving any method.
fn push_next_routes(facts: &mut FileFacts) {
    let Some((path, style)) = next_route_from_path(&facts.path) else {
        return;
    };
    match style {
        NextRouteStyle::AppApi => {
            let mut handled = false;
            for symbol in &facts.symbols {
                if symbol.exported
                    && symbol.kind == SymbolKind::Function
                    && NEXT_HANDLER_EXPORTS.contains(&symbol.name.as_str())
                {
                    facts.routes.push(RouteDraft {
                        method: symbol.name.clone(),
                        path: path.clone(),
                        handler: symbol.qualname.clone(),
                        middleware: Vec::new(),
                        framework: Framework::Nextjs,
                        line: symbol.start_line,
                    });
                    handled = true;
                }
            }
            if handled {
                for symbol in &mut facts.symbols {
                    if symbol.exported && NEXT_HANDLER_EXPORTS.contains(&symbol.name.as_str()) {
                        symbol.kind = SymbolKind::RouteHandler;
                    }
                }
            }
        }
        NextRouteStyle::AppPage => {
            push_default_export_route(facts, "GET", path);
        }
        NextRouteStyle::PagesApi => {
            push_default_export_route(facts, "ANY", path);
        }
    }
}

fn push_default_export_route(facts: &mut FileFacts, method: &str, path: String) {
    let handler = facts
        .default_export
        .clone()
        .unwrap_or_else(|| "<anonymous>".to_string());
    let line = facts
        .symbols
        .iter()
        .find(|s| s.qualname == handler)
        .map(|s| s.start_line)
        .unwrap_or(1);
    if let Some(symbol) = facts.symbols.iter_mut().find(|s| s.qualname == handler) {
        symbol.kind = SymbolKind::RouteHandler;
    }
    facts.routes.push(RouteDraft {
        method: method.to_string(),
        path,
        handler,
        middleware: Vec::new(),
        framework: Framework::Nextjs,
        line,
    });
}

enum NextRouteStyle {
    AppApi,
    AppPage,
    PagesApi,
}

fn next_route_from_path(rel_path: &str) -> Option<(String, NextRouteStyle)> {
    let without_ext = rel_path.rsplit_once('.').map(|(h, _)| h).unwrap_or(rel_path);
    let mut parts: Vec<&str> = without_ext.split('/').collect();
    if parts.first() == Some(&"src") {
        parts.remove(0);
    }
    let app_dir = match parts.first() {
        Some(&"app") => true,
        Some(&"pages") => false,
        _ => return None,
    };
    let mut segments: Vec<String> = Vec::new();
    for seg in &parts[1..] {
        if seg.is_empty() || seg.starts_with('(') {
            continue;
        }
        segments.push((*seg).to_string());
    }
    let style = if app_dir {
        if segments.last().map(String::as_str) == Some("route") {
            segments.pop();
            if segments.first().map(String::as_str) != Some("api") {
                return None;
            }
            NextRouteStyle::AppApi
        } else if segments.last().map(String::as_str) == Some("page") {
            segments.pop();
            NextRouteStyle::AppPage
        } else {
            return None;
        }
    } else {
        if segments.first().map(String::as_str) != Some("api") {
            return None;
        }
        if segments.last().map(String::as_str) == Some("index") {
            segments.pop();
        }
        NextRouteStyle::PagesApi
    };
    let joined = format!("/{}", segments.join("/"));
    Some((http::normalize_path(&joined), style))
}

fn decorator_nodes(node: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "decorator" {
            out.push(child);
        }
    }
    out
}

fn decorator_name_and_args<'a>(node: Node<'a>, source: &str) -> Option<(String, Vec<Node<'a>>)> {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "call_expression" {
            let target_node = call_target_node(child)?;
            let raw = node_text(target_node, source);
            let name = raw.rsplit('.').next().unwrap_or(raw.as_str()).to_string();
            return Some((name, call_arguments(child)));
        }
    }
    let raw = node_text(node, source);
    let name = raw
        .trim_start_matches('@')
        .rsplit('.')
        .next()
        .unwrap_or(raw.as_str())
        .to_string();
    if name.is_empty() {
        None
    } else {
        Some((name, Vec::new()))
    }
}

fn call_arguments(node: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let Some(args) = node.child_by_field_name("arguments") else {
        return out;
    };
    let mut cursor = args.walk();
    for child in args.named_children(&mut cursor) {
        out.push(child);
    }
    out
}

fn reference_args(args: &[Node<'_>], source: &str) -> Vec<String> {
    args.iter()
        .filter_map(|arg| {
            let raw = node_text(*arg, source);
            is_simple_reference(&raw).then_some(raw)
        })
        .collect()
}

fn injectable_scope(arg: Option<&Node<'_>>, source: &str) -> BindingScope {
    let Some(arg) = arg else {
        return BindingScope::Singleton;
    };
    let text = node_text(*arg, source);
    if text.contains("REQUEST") {
        BindingScope::RequestScoped
    } else if text.contains("TRANSIENT") {
        BindingScope::Transient
    } else {
        BindingScope::Singleton
    }
}

fn require_specifier(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    let target = call_target_node(node)?;
    if node_text(target, source) != "require" {
        return None;
    }
    let args = call_arguments(node);
    extract_string_literal(*args.first()?, source)
}

fn member_receiver_and_method(node: Node<'_>, source: &str) -> Option<(String, String)> {
    if node.kind() != "member_expression" && node.kind() != "optional_member_expression" {
        return None;
    }
    let receiver = node
        .child_by_field_name("object")
        .map(|obj| node_text(obj, source))?;
    let method = node
        .child_by_field_name("property")
        .map(|prop| node_text(prop, source))?;
    Some((receiver, method))
}

fn member_object_and_method<'a>(node: Node<'a>, source: &str) -> Option<(Node<'a>, String)> {
    if node.kind() != "member_expression" && node.kind() != "optional_member_expression" {
        return None;
    }
    let object = node.child_by_field_name("object")?;
    let method = node
        .child_by_field_name("property")
        .map(|prop| node_text(prop, source))?;
    Some((object, method))
}

fn is_router_receiver(raw: &str) -> bool {
    let head = raw.split('.').next().unwrap_or(raw);
    let head = head.trim_start_matches('_');
    ROUTER_RECEIVERS.contains(&head)
        || head.ends_with("Router")
        || head.ends_with("router")
}

fn call_target_node(node: Node<'_>) -> Option<Node<'_>> {
    node.child_by_field_name("function")
        .or_else(|| node.child_by_field_name("callee"))
        .or_else(|| node.child_by_field_name("constructor"))
}

/// Rewrite `this.x`/`super.x` to the enclosing class qualname; keep other
/// dotted references as written for later resolution.
fn resolve_reference(raw: &str, ctx: &Context) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || !is_simple_reference(raw) {
        return None;
    }
    let mut parts: Vec<&str> = raw.split('.').collect();
    if parts[0] == "this" || parts[0] == "super" {
        parts.remove(0);
        if parts.is_empty() || ctx.class_stack.is_empty() {
            return None;
        }
        return Some(format!("{}.{}", ctx.class_stack.join("."), parts.join(".")));
    }
    Some(raw.to_string())
}

fn is_simple_reference(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .chars()
            .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '.' || ch == '$')
}

fn has_token_child(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == token {
            return true;
        }
    }
    false
}

fn type_text(node: Node<'_>, source: &str) -> String {
    // The annotation node includes the leading colon.
    let text = node_text(node, source);
    let text = text.trim_start_matches(':').trim();
    match text.split_once('<') {
        Some((head, _)) => head.trim().to_string(),
        None => text.to_string(),
    }
}

fn extract_string_literal(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() == "template_string" {
        return None;
    }
    let raw = node_text(node, source);
    unquote_string_literal(&raw)
}

fn unquote_string_literal(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() < 2 {
        return None;
    }
    let first = trimmed.chars().next()?;
    if first == '"' || first == '\'' || first == '`' {
        let last = trimmed.chars().last()?;
        if last == first {
            return Some(trimmed[1..trimmed.len() - 1].to_string());
        }
    }
    None
}

fn extract_signature(node: Node<'_>, source: &str) -> Option<String> {
    let params = node
        .child_by_field_name("parameters")
        .map(|n| node_text(n, source));
    params.filter(|value| !value.is_empty())
}

fn span(node: Node<'_>) -> (u32, u32) {
    (
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
}

fn build_qualname(class_stack: &[String], name: &str) -> String {
    if class_stack.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", class_stack.join("."), name)
    }
}

pub(crate) fn node_text(node: Node<'_>, source: &str) -> String {
    source
        .get(node.start_byte()..node.end_byte())
        .unwrap_or("")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;
    use crate::parser::Extractor;

    fn extract_ts(source: &str, rel_path: &str) -> FileFacts {
        let mut facts = FileFacts::new(rel_path.to_string(), Language::Typescript, "h".into());
        let mut extractor = TypescriptExtractor::new().unwrap();
        extractor
            .extract(source, &mut facts, FrameworkHint::Auto)
            .unwrap();
        facts
    }

    fn extract_js(source: &str, rel_path: &str) -> FileFacts {
        let mut facts = FileFacts::new(rel_path.to_string(), Language::Javascript, "h".into());
        let mut extractor = JavascriptExtractor::new().unwrap();
        extractor
            .extract(source, &mut facts, FrameworkHint::Auto)
            .unwrap();
        facts
    }

    #[test]
    fn nestjs_controller_routes_and_di() {
        let source = r#"
import { Controller, Get, Post, UseGuards } from "@nestjs/common";
import { UserService } from "./user.service";
import { AuthGuard } from "./auth.guard";

@Controller("users")
@UseGuards(AuthGuard)
export class UsersController {
  constructor(private readonly userService: UserService) {}

  @Get(":id")
  findOne(id: string) {
    return this.userService.findOne(id);
  }

  @Post()
  create(dto: CreateUserDto) {
    return this.userService.create(dto);
  }
}
"#;
        let facts = extract_ts(source, "src/users/users.controller.ts");
        assert_eq!(facts.routes.len(), 2);
        let get = &facts.routes[0];
        assert_eq!(get.method, "GET");
        assert_eq!(get.path, "/users/:id");
        assert_eq!(get.handler, "UsersController.findOne");
        assert_eq!(get.middleware, vec!["AuthGuard".to_string()]);
        assert_eq!(facts.routes[1].path, "/users");

        assert!(facts.di.iter().any(|d| {
            d.provider == "UserService" && d.consumer == "UsersController"
        }));
        assert!(facts.calls.iter().any(|c| {
            c.caller == "UsersController.findOne"
                && c.reference == "UsersController.userService.findOne"
        }));
        let find_one = facts
            .symbols
            .iter()
            .find(|s| s.qualname == "UsersController.findOne")
            .unwrap();
        assert_eq!(find_one.kind, SymbolKind::RouteHandler);
    }

    #[test]
    fn injectable_scope_detection() {
        let source = r#"
import { Injectable, Scope } from "@nestjs/common";

@Injectable({ scope: Scope.REQUEST })
export class RequestContext {}

@Injectable()
export class UserService {}
"#;
        let facts = extract_ts(source, "src/user.service.ts");
        assert_eq!(facts.providers.len(), 2);
        assert_eq!(facts.providers[0].scope, BindingScope::RequestScoped);
        assert_eq!(facts.providers[1].scope, BindingScope::Singleton);
    }

    #[test]
    fn nestjs_cron_jobs() {
        let source = r#"
import { Injectable } from "@nestjs/common";
import { Cron, Interval } from "@nestjs/schedule";

@Injectable()
export class CleanupService {
  @Cron("0 3 * * *")
  nightly() {}

  @Interval(5000)
  poll() {}
}
"#;
        let facts = extract_ts(source, "src/cleanup.service.ts");
        assert_eq!(facts.jobs.len(), 2);
        assert_eq!(
            facts.jobs[0].trigger,
            TriggerSpec::Cron {
                expr: "0 3 * * *".to_string()
            }
        );
        assert_eq!(facts.jobs[0].handler, "CleanupService.nightly");
        assert_eq!(
            facts.jobs[1].trigger,
            TriggerSpec::Cron {
                expr: "interval 5000".to_string()
            }
        );
    }

    #[test]
    fn express_routes_with_middleware() {
        let source = r#"
const express = require("express");
const { requireAuth } = require("./middleware/auth");
const handlers = require("./handlers");

const app = express();

app.get("/orders/:id", requireAuth, handlers.getOrder);
app.post("/orders", createOrder);

function createOrder(req, res) {}

module.exports = { createOrder };
"#;
        let facts = extract_js(source, "server/app.js");
        assert_eq!(facts.routes.len(), 2);
        let get = &facts.routes[0];
        assert_eq!(get.method, "GET");
        assert_eq!(get.path, "/orders/:id");
        assert_eq!(get.handler, "handlers.getOrder");
        assert_eq!(get.middleware, vec!["requireAuth".to_string()]);
        assert_eq!(facts.routes[1].handler, "createOrder");

        assert!(facts.imports.iter().any(|i| {
            i.specifier == "./middleware/auth" && i.imported.as_deref() == Some("requireAuth")
        }));
        let create = facts
            .symbols
            .iter()
            .find(|s| s.qualname == "createOrder")
            .unwrap();
        assert!(create.exported);
    }

    #[test]
    fn express_route_chain() {
        let source = r#"
import { Router } from "express";
import { listUsers, createUser } from "./users";

const router = Router();
router.route("/users").get(listUsers).post(createUser);
"#;
        let facts = extract_js(source, "server/routes.js");
        assert!(facts.routes.iter().any(|r| {
            r.method == "GET" && r.path == "/users" && r.handler == "listUsers"
        }));
    }

    #[test]
    fn next_app_router_handlers() {
        let source = r#"
import { db } from "@/lib/db";

export async function GET(request: Request) {
  return db.users.findMany();
}

export async function POST(request: Request) {
  return db.users.create();
}
"#;
        let facts = extract_ts(source, "app/api/users/[id]/route.ts");
        assert_eq!(facts.routes.len(), 2);
        assert_eq!(facts.routes[0].method, "GET");
        assert_eq!(facts.routes[0].path, "/api/users/:id");
        assert_eq!(facts.routes[0].handler, "GET");
        assert!(facts
            .symbols
            .iter()
            .all(|s| s.kind == SymbolKind::RouteHandler));
    }

    #[test]
    fn next_app_router_page_component() {
        let source = r#"
export default function TeamPage(props) {
  return render(props);
}
"#;
        let facts = extract_ts(source, "app/dashboard/[team]/page.tsx");
        assert_eq!(facts.routes.len(), 1);
        assert_eq!(facts.routes[0].method, "GET");
        assert_eq!(facts.routes[0].path, "/dashboard/:team");
        assert_eq!(facts.routes[0].handler, "TeamPage");
        assert_eq!(facts.symbols[0].kind, SymbolKind::RouteHandler);

        let grouped = extract_ts(source, "app/(marketing)/pricing/page.tsx");
        assert_eq!(grouped.routes[0].path, "/pricing");
    }

    #[test]
    fn next_pages_api_default_export() {
        let source = r#"
export default async function handler(req, res) {
  res.status(200).json({ ok: true });
}
"#;
        let facts = extract_js(source, "pages/api/health.js");
        assert_eq!(facts.routes.len(), 1);
        assert_eq!(facts.routes[0].method, "ANY");
        assert_eq!(facts.routes[0].path, "/api/health");
        assert_eq!(facts.routes[0].handler, "handler");
        assert_eq!(facts.default_export.as_deref(), Some("handler"));
    }

    #[test]
    fn es_import_bindings() {
        let source = r#"
import UserService from "./user.service";
import { save, load as restore } from "./storage";
import * as helpers from "./helpers";
import "./side-effect";
"#;
        let facts = extract_ts(source, "src/index.ts");
        let triples: Vec<(&str, Option<&str>, Option<&str>)> = facts
            .imports
            .iter()
            .map(|i| {
                (
                    i.specifier.as_str(),
                    i.imported.as_deref(),
                    i.local_name.as_deref(),
                )
            })
            .collect();
        assert!(triples.contains(&("./user.service", Some("default"), Some("UserService"))));
        assert!(triples.contains(&("./storage", Some("save"), Some("save"))));
        assert!(triples.contains(&("./storage", Some("load"), Some("restore"))));
        assert!(triples.contains(&("./helpers", None, Some("helpers"))));
        assert!(triples.contains(&("./side-effect", None, None)));
    }

    #[test]
    fn arrow_function_symbols() {
        let source = r#"
export const fetchUser = async (id) => {
  return api.get(id);
};
"#;
        let facts = extract_js(source, "src/client.js");
        let symbol = &facts.symbols[0];
        assert_eq!(symbol.qualname, "fetchUser");
        assert_eq!(symbol.kind, SymbolKind::Function);
        assert!(symbol.exported);
        assert!(facts.calls.iter().any(|c| {
            c.caller == "fetchUser" && c.reference == "api.get"
        }));
    }

    #[test]
    fn syntax_error_marks_parse_failure() {
        let facts = extract_ts("class {{{", "broken.ts");
        assert!(facts.parse_failed);
        assert!(facts.symbols.is_empty());
    }
}
