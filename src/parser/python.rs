use crate::model::{BindingScope, Framework, FrameworkHint, SymbolKind, TriggerSpec};
use crate::parser::facts::{
    CallSiteFact, DiDraft, FileFacts, ImportFact, JobDraft, RouteDraft, SymbolFact,
};
use crate::parser::http;
use crate::parser::javascript::node_text;
use anyhow::Result;
use std::path::Path;
use tree_sitter::{Node, Parser};

#[derive(Clone)]
struct Context {
    class_stack: Vec<String>,
    fn_depth: usize,
    /// Qualname of the enclosing symbol, when there is one. Module-level
    /// statements have no enclosing symbol and produce no call facts.
    current_scope: Option<String>,
    route_handler: bool,
}

impl Context {
    fn top() -> Self {
        Context {
            class_stack: Vec::new(),
            fn_depth: 0,
            current_scope: None,
            route_handler: false,
        }
    }
}

pub struct PythonExtractor {
    parser: Parser,
}

impl PythonExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

impl crate::parser::Extractor for PythonExtractor {
    fn extract(&mut self, source: &str, facts: &mut FileFacts, hint: FrameworkHint) -> Result<()> {
        let tree = match self.parser.parse(source, None) {
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
        let walker = Walker {
            source,
            hint,
            base_package: base_package_parts(&facts.path),
        };
        walker.walk_node(root, &Context::top(), facts);
        Ok(())
    }
}

struct Walker<'a> {
    source: &'a str,
    hint: FrameworkHint,
    base_package: Vec<String>,
}

impl Walker<'_> {
    fn walk_node(&self, node: Node<'_>, ctx: &Context, out: &mut FileFacts) {
        if node.kind() == "decorated_definition" {
            self.handle_decorated_definition(node, ctx, out);
            return;
        }
        if node.kind() == "call" {
            self.handle_call(node, ctx, out);
        }
        match node.kind() {
            "class_definition" => {
                if ctx.fn_depth > 0 {
                    return;
                }
                let Some(name_node) = node.child_by_field_name("name") else {
                    return;
                };
                let name = node_text(name_node, self.source);
                let qualname = build_qualname(&ctx.class_stack, &name);
                let (start_line, end_line) = span(node);
                out.symbols.push(SymbolFact {
                    qualname: qualname.clone(),
                    name: name.clone(),
                    kind: SymbolKind::Class,
                    start_line,
                    end_line,
                    exported: is_exported(&name, &ctx.class_stack),
                    signature: None,
                });
                let mut next_ctx = ctx.clone();
                next_ctx.class_stack.push(name);
                next_ctx.current_scope = Some(qualname);
                next_ctx.route_handler = false;
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk_block(body, &next_ctx, out);
                }
                return;
            }
            "function_definition" | "async_function_definition" => {
                if ctx.fn_depth > 0 {
                    return;
                }
                let Some(name_node) = node.child_by_field_name("name") else {
                    return;
                };
                let name = node_text(name_node, self.source);
                let qualname = build_qualname(&ctx.class_stack, &name);
                let (start_line, end_line) = span(node);
                let kind = if ctx.route_handler {
                    SymbolKind::RouteHandler
                } else if ctx.class_stack.is_empty() {
                    SymbolKind::Function
                } else {
                    SymbolKind::Method
                };
                out.symbols.push(SymbolFact {
                    qualname: qualname.clone(),
                    name,
                    kind,
                    start_line,
                    end_line,
                    exported: is_exported(&qualname, &ctx.class_stack),
                    signature: extract_signature(node, self.source),
                });
                if self.hint.allows(Framework::Fastapi) {
                    self.depends_di_drafts(node, &qualname, out);
                }
                let mut next_ctx = ctx.clone();
                next_ctx.fn_depth += 1;
                next_ctx.current_scope = Some(qualname);
                next_ctx.route_handler = false;
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk_block(body, &next_ctx, out);
                }
                return;
            }
            "import_statement" | "import_from_statement" => {
                if ctx.fn_depth == 0 {
                    let text = node_text(node, self.source);
                    let (line, _) = span(node);
                    for (specifier, imported, local_name) in parse_import_bindings(&text) {
                        let specifier = absolutize_module(&specifier, &self.base_package)
                            .unwrap_or(specifier);
                        out.imports.push(ImportFact {
                            specifier,
                            imported,
                            local_name,
                            line,
                        });
                    }
                }
                return;
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.walk_node(child, ctx, out);
        }
    }

    fn walk_block(&self, node: Node<'_>, ctx: &Context, out: &mut FileFacts) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.walk_node(child, ctx, out);
        }
    }

    fn handle_call(&self, node: Node<'_>, ctx: &Context, out: &mut FileFacts) {
        if self.hint.allows(Framework::Django) {
            if let Some(draft) = self.django_path_route(node, ctx) {
                out.routes.push(draft);
            }
        }
        if self.hint.allows(Framework::Fastapi) {
            out.routes.extend(self.add_api_route_drafts(node, ctx));
        }
        let Some(scope) = ctx.current_scope.as_ref() else {
            return;
        };
        let Some(function_node) = node.child_by_field_name("function") else {
            return;
        };
        let raw = node_text(function_node, self.source);
        let Some(reference) = resolve_reference(&raw, ctx) else {
            return;
        };
        out.calls.push(CallSiteFact {
            caller: scope.clone(),
            reference,
            line: span(node).0,
        });
    }

    fn handle_decorated_definition(&self, node: Node<'_>, ctx: &Context, out: &mut FileFacts) {
        let mut decorators = Vec::new();
        let mut definition = None;
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "decorator" {
                decorators.push(child);
            } else if matches!(
                child.kind(),
                "function_definition" | "async_function_definition" | "class_definition"
            ) {
                definition = Some(child);
            }
        }
        let Some(definition) = definition else {
            return;
        };
        let mut next_ctx = ctx.clone();
        if let Some(handler) = handler_qualname(definition, ctx, self.source) {
            let routes = self.route_drafts_from_decorators(&decorators, &handler);
            next_ctx.route_handler = !routes.is_empty();
            out.routes.extend(routes);
            if self.hint.allows_python_jobs() {
                out.jobs
                    .extend(self.job_drafts_from_decorators(&decorators, &handler));
            }
        }
        self.walk_node(definition, &next_ctx, out);
    }

    fn route_drafts_from_decorators(
        &self,
        decorators: &[Node<'_>],
        handler: &str,
    ) -> Vec<RouteDraft> {
        let mut drafts = Vec::new();
        if !self.hint.allows(Framework::Fastapi) && !self.hint.allows(Framework::Flask) {
            return drafts;
        }
        for decorator in decorators {
            let Some((name, Some(args))) = decorator_name_and_args(*decorator, self.source) else {
                continue;
            };
            let name = name.to_ascii_lowercase();
            let line = span(*decorator).0;
            if is_http_method_name(&name) {
                let raw_path = args
                    .positional
                    .first()
                    .and_then(|arg| extract_string_literal(*arg, self.source))
                    .unwrap_or_else(|| "/".to_string());
                drafts.push(self.route_draft(
                    handler,
                    &http::normalize_method(&name),
                    &raw_path,
                    &args,
                    line,
                ));
                continue;
            }
            if name == "route" || name == "api_route" {
                let raw_path = args
                    .positional
                    .first()
                    .and_then(|arg| extract_string_literal(*arg, self.source))
                    .unwrap_or_else(|| "/".to_string());
                let mut methods = methods_from_keywords(&args, self.source);
                if methods.is_empty() {
                    methods.push(if name == "route" {
                        "GET".to_string()
                    } else {
                        "ANY".to_string()
                    });
                }
                for method in methods {
                    drafts.push(self.route_draft(handler, &method, &raw_path, &args, line));
                }
            }
        }
        drafts
    }

    fn route_draft(
        &self,
        handler: &str,
        method: &str,
        raw_path: &str,
        args: &CallArgs<'_>,
        line: u32,
    ) -> RouteDraft {
        RouteDraft {
            method: method.to_string(),
            path: http::normalize_path(raw_path),
            handler: handler.to_string(),
            middleware: self.dependencies_from_keywords(args),
            framework: self.python_route_framework(),
            line,
        }
    }

    fn python_route_framework(&self) -> Framework {
        match self.hint {
            FrameworkHint::Flask => Framework::Flask,
            _ => Framework::Fastapi,
        }
    }

    /// `dependencies=[Depends(require_auth)]` on a route decorator acts as
    /// middleware for that route.
    fn dependencies_from_keywords(&self, args: &CallArgs<'_>) -> Vec<String> {
        let Some((_, value)) = args.keywords.iter().find(|(k, _)| k == "dependencies") else {
            return Vec::new();
        };
        let mut refs = Vec::new();
        let mut cursor = value.walk();
        for child in value.named_children(&mut cursor) {
            if let Some(provider) = depends_provider(child, self.source) {
                refs.push(provider);
            }
        }
        refs
    }

    fn job_drafts_from_decorators(
        &self,
        decorators: &[Node<'_>],
        handler: &str,
    ) -> Vec<JobDraft> {
        let mut drafts = Vec::new();
        for decorator in decorators {
            let Some((name, args)) = decorator_name_and_args(*decorator, self.source) else {
                continue;
            };
            let line = span(*decorator).0;
            match name.as_str() {
                "task" | "shared_task" => {
                    let job_name = args
                        .as_ref()
                        .and_then(|args| keyword_string(args, "name", self.source))
                        .unwrap_or_else(|| handler.to_string());
                    drafts.push(JobDraft {
                        name: job_name.clone(),
                        trigger: TriggerSpec::Event { name: job_name },
                        handler: handler.to_string(),
                        line,
                    });
                }
                "scheduled_job" => {
                    let Some(args) = args.as_ref() else { continue };
                    let expr = schedule_expr(args, self.source);
                    let job_name = keyword_string(args, "id", self.source)
                        .unwrap_or_else(|| handler.to_string());
                    drafts.push(JobDraft {
                        name: job_name,
                        trigger: TriggerSpec::Cron { expr },
                        handler: handler.to_string(),
                        line,
                    });
                }
                "on_event" => {
                    let Some(args) = args.as_ref() else { continue };
                    let Some(event) = args
                        .positional
                        .first()
                        .and_then(|arg| extract_string_literal(*arg, self.source))
                    else {
                        continue;
                    };
                    drafts.push(JobDraft {
                        name: format!("{event}:{handler}"),
                        trigger: TriggerSpec::Event { name: event },
                        handler: handler.to_string(),
                        line,
                    });
                }
                _ => {}
            }
        }
        drafts
    }

    fn django_path_route(&self, node: Node<'_>, _ctx: &Context) -> Option<RouteDraft> {
        let name = call_target_name(node, self.source)?;
        if name != "path" && name != "re_path" {
            return None;
        }
        let args = parse_call_arguments(node, self.source);
        let raw_path = args
            .positional
            .first()
            .and_then(|arg| extract_string_literal(*arg, self.source))?;
        let handler_node = args.positional.get(1)?;
        let handler = node_text(*handler_node, self.source);
        if handler.is_empty() || !is_simple_reference(&handler) {
            return None;
        }
        // views.as_view() and lambdas are not simple references; skipped.
        Some(RouteDraft {
            method: "ANY".to_string(),
            path: http::normalize_path(&raw_path),
            handler,
            middleware: Vec::new(),
            framework: Framework::Django,
            line: span(node).0,
        })
    }

    fn add_api_route_drafts(&self, node: Node<'_>, _ctx: &Context) -> Vec<RouteDraft> {
        let Some(function) = node.child_by_field_name("function") else {
            return Vec::new();
        };
        let Some((base, name)) = attribute_base_and_name(function, self.source) else {
            return Vec::new();
        };
        if name != "add_api_route" || base.is_empty() {
            return Vec::new();
        }
        let args = parse_call_arguments(node, self.source);
        let Some(raw_path) = args
            .positional
            .first()
            .and_then(|arg| extract_string_literal(*arg, self.source))
        else {
            return Vec::new();
        };
        let Some(handler_node) = args.positional.get(1) else {
            return Vec::new();
        };
        let handler = node_text(*handler_node, self.source);
        if handler.is_empty() || !is_simple_reference(&handler) {
            return Vec::new();
        }
        let mut methods = methods_from_keywords(&args, self.source);
        if methods.is_empty() {
            methods.push("ANY".to_string());
        }
        let line = span(node).0;
        methods
            .into_iter()
            .map(|method| RouteDraft {
                method,
                path: http::normalize_path(&raw_path),
                handler: handler.clone(),
                middleware: Vec::new(),
                framework: Framework::Fastapi,
                line,
            })
            .collect()
    }

    /// FastAPI `Depends(...)` in a parameter default wires the provider into
    /// this function with request scope.
    fn depends_di_drafts(&self, node: Node<'_>, qualname: &str, out: &mut FileFacts) {
        let Some(params) = node.child_by_field_name("parameters") else {
            return;
        };
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if !matches!(
                param.kind(),
                "default_parameter" | "typed_default_parameter"
            ) {
                continue;
            }
            let Some(value) = param.child_by_field_name("value") else {
                continue;
            };
            if let Some(provider) = depends_provider(value, self.source) {
                out.di.push(DiDraft {
                    provider,
                    consumer: qualname.to_string(),
                    scope: BindingScope::RequestScoped,
                    line: span(param).0,
                });
            }
        }
    }
}

fn handler_qualname(node: Node<'_>, ctx: &Context, source: &str) -> Option<String> {
    if node.kind() == "class_definition" {
        return None;
    }
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source);
    if name.is_empty() {
        return None;
    }
    Some(build_qualname(&ctx.class_stack, &name))
}

fn depends_provider(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "call" {
        return None;
    }
    let name = call_target_name(node, source)?;
    if name != "Depends" {
        return None;
    }
    let args = parse_call_arguments(node, source);
    let provider = node_text(*args.positional.first()?, source);
    if provider.is_empty() || !is_simple_reference(&provider) {
        return None;
    }
    Some(provider)
}

struct CallArgs<'a> {
    positional: Vec<Node<'a>>,
    keywords: Vec<(String, Node<'a>)>,
}

fn parse_call_arguments<'a>(node: Node<'a>, source: &str) -> CallArgs<'a> {
    let mut positional = Vec::new();
    let mut keywords = Vec::new();
    let Some(args) = node.child_by_field_name("arguments") else {
        return CallArgs {
            positional,
            keywords,
        };
    };
    let mut cursor = args.walk();
    for child in args.named_children(&mut cursor) {
        if child.kind() == "keyword_argument" {
            if let (Some(name_node), Some(value_node)) = (
                child.child_by_field_name("name"),
                child.child_by_field_name("value"),
            ) {
                keywords.push((node_text(name_node, source), value_node));
            }
            continue;
        }
        positional.push(child);
    }
    CallArgs {
        positional,
        keywords,
    }
}

/// Decorator target name (last attribute segment) plus call arguments when
/// the decorator is a call. `@shared_task` without parens yields `None` args.
fn decorator_name_and_args<'a>(
    node: Node<'a>,
    source: &str,
) -> Option<(String, Option<CallArgs<'a>>)> {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "call" => {
                let name = call_target_name(child, source)?;
                return Some((name, Some(parse_call_arguments(child, source))));
            }
            "identifier" | "attribute" => {
                let name = last_attribute_segment(child, source)?;
                return Some((name, None));
            }
            _ => {}
        }
    }
    None
}

fn call_target_name(node: Node<'_>, source: &str) -> Option<String> {
    let function = node.child_by_field_name("function")?;
    last_attribute_segment(function, source)
}

fn last_attribute_segment(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() == "attribute" {
        if let Some(attr) = node.child_by_field_name("attribute") {
            return Some(node_text(attr, source));
        }
    }
    let text = node_text(node, source);
    if text.is_empty() { None } else { Some(text) }
}

fn attribute_base_and_name(node: Node<'_>, source: &str) -> Option<(String, String)> {
    if node.kind() == "attribute" {
        let base = node
            .child_by_field_name("object")
            .map(|n| node_text(n, source));
        let name = node
            .child_by_field_name("attribute")
            .map(|n| node_text(n, source));
        if let Some(name) = name {
            return Some((base.unwrap_or_default(), name));
        }
    }
    Some((String::new(), node_text(node, source)))
}

fn is_http_method_name(name: &str) -> bool {
    matches!(
        name,
        "get" | "post" | "put" | "delete" | "patch" | "head" | "options"
    )
}

fn methods_from_keywords(args: &CallArgs<'_>, source: &str) -> Vec<String> {
    for (name, value) in &args.keywords {
        if name == "methods" {
            return extract_string_list(*value, source)
                .into_iter()
                .map(|raw| http::normalize_method(&raw))
                .collect();
        }
    }
    Vec::new()
}

fn keyword_string(args: &CallArgs<'_>, key: &str, source: &str) -> Option<String> {
    args.keywords
        .iter()
        .find(|(name, _)| name == key)
        .and_then(|(_, value)| extract_string_literal(*value, source))
}

const SCHEDULE_META_KEYS: &[&str] = &["id", "name", "args", "kwargs", "misfire_grace_time"];

/// Render a scheduler decorator's arguments as one descriptor string, e.g.
/// `cron hour=3 minute=0` or `interval seconds=30`.
fn schedule_expr(args: &CallArgs<'_>, source: &str) -> String {
    let mut parts = Vec::new();
    if let Some(kind) = args
        .positional
        .first()
        .and_then(|arg| extract_string_literal(*arg, source))
    {
        parts.push(kind);
    }
    for (name, value) in &args.keywords {
        if SCHEDULE_META_KEYS.contains(&name.as_str()) {
            continue;
        }
        let value = extract_string_literal(*value, source).unwrap_or_default();
        parts.push(format!("{name}={value}"));
    }
    parts.join(" ")
}

fn extract_string_literal(node: Node<'_>, source: &str) -> Option<String> {
    let raw = node_text(node, source);
    unquote_string_literal(&raw).or(Some(raw))
}

fn extract_string_list(node: Node<'_>, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    if matches!(node.kind(), "list" | "tuple" | "set") {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if let Some(value) = extract_string_literal(child, source) {
                out.push(value);
            }
        }
        return out;
    }
    if let Some(value) = extract_string_literal(node, source) {
        out.push(value);
    }
    out
}

/// Rewrite `self.x`/`cls.x` to the enclosing class qualname; everything else
/// keeps its written form for resolution against imports later.
fn resolve_reference(raw: &str, ctx: &Context) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || !is_simple_reference(raw) {
        return None;
    }
    let mut parts: Vec<&str> = raw.split('.').collect();
    if parts[0] == "self" || parts[0] == "cls" {
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
            .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '.')
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

fn is_exported(qualname: &str, class_stack: &[String]) -> bool {
    let own_private = qualname
        .rsplit('.')
        .next()
        .map(|name| name.starts_with('_'))
        .unwrap_or(false);
    !own_private && !class_stack.iter().any(|class| class.starts_with('_'))
}

fn extract_signature(node: Node<'_>, source: &str) -> Option<String> {
    let params = node
        .child_by_field_name("parameters")
        .map(|n| node_text(n, source));
    let return_type = node
        .child_by_field_name("return_type")
        .map(|n| node_text(n, source));
    match (params, return_type) {
        (Some(p), Some(r)) => Some(format!("{p} -> {r}")),
        (Some(p), None) => Some(p),
        _ => None,
    }
}

fn unquote_string_literal(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut idx = 0;
    for (offset, ch) in trimmed.char_indices() {
        if ch.is_ascii_alphabetic() {
            idx = offset + ch.len_utf8();
        } else {
            break;
        }
    }
    let rest = &trimmed[idx..];
    for quotes in ["'''", "\"\"\""] {
        if rest.starts_with(quotes) && rest.ends_with(quotes) && rest.len() >= 6 {
            return Some(rest[3..rest.len() - 3].to_string());
        }
    }
    for quote in ['"', '\''] {
        if rest.starts_with(quote) && rest.ends_with(quote) && rest.len() >= 2 {
            return Some(rest[1..rest.len() - 1].to_string());
        }
    }
    None
}

/// One `(specifier, imported name, local binding)` per imported name. Star
/// imports bind nothing locally; whole-module imports carry no imported name.
fn parse_import_bindings(text: &str) -> Vec<(String, Option<String>, Option<String>)> {
    let cleaned = text.replace(['\n', '(', ')', '\\'], " ");
    let cleaned = cleaned.trim().trim_end_matches(';');
    if let Some(rest) = cleaned.strip_prefix("import ") {
        return rest
            .split(',')
            .filter_map(|part| {
                let mut tokens = part.trim().split_whitespace();
                let module = tokens.next()?.to_string();
                let alias = match (tokens.next(), tokens.next()) {
                    (Some("as"), Some(alias)) => alias.to_string(),
                    _ => module.clone(),
                };
                Some((module, None, Some(alias)))
            })
            .collect();
    }
    if let Some(rest) = cleaned.strip_prefix("from ") {
        if let Some((module, names)) = rest.split_once(" import ") {
            let base = module.trim();
            return names
                .split(',')
                .filter_map(|part| {
                    let mut tokens = part.trim().split_whitespace();
                    let item = tokens.next()?;
                    if item == "*" {
                        return Some((base.to_string(), None, None));
                    }
                    let alias = match (tokens.next(), tokens.next()) {
                        (Some("as"), Some(alias)) => alias.to_string(),
                        _ => item.to_string(),
                    };
                    Some((base.to_string(), Some(item.to_string()), Some(alias)))
                })
                .collect();
        }
    }
    Vec::new()
}

/// Package parts the importing file lives in, used to absolutize relative
/// imports. Both `pkg/mod.py` and `pkg/__init__.py` resolve `.` to `pkg`.
fn base_package_parts(rel_path: &str) -> Vec<String> {
    let mut parts: Vec<String> = Path::new(rel_path)
        .components()
        .filter_map(|comp| comp.as_os_str().to_str().map(|s| s.to_string()))
        .collect();
    parts.pop();
    parts
}

fn absolutize_module(candidate: &str, base_package: &[String]) -> Option<String> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return None;
    }
    if !trimmed.starts_with('.') {
        return Some(trimmed.to_string());
    }
    let dot_count = trimmed.chars().take_while(|ch| *ch == '.').count();
    let rest = &trimmed[dot_count..];
    let up = dot_count.saturating_sub(1);
    if up > base_package.len() {
        return None;
    }
    let mut parts: Vec<String> = base_package.to_vec();
    let keep = parts.len().saturating_sub(up);
    parts.truncate(keep);
    for segment in rest.split('.').filter(|part| !part.is_empty()) {
        parts.push(segment.to_string());
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;
    use crate::parser::Extractor;

    fn extract(source: &str, rel_path: &str) -> FileFacts {
        let mut facts = FileFacts::new(rel_path.to_string(), Language::Python, "h".to_string());
        let mut extractor = PythonExtractor::new().unwrap();
        extractor
            .extract(source, &mut facts, FrameworkHint::Auto)
            .unwrap();
        facts
    }

    #[test]
    fn extracts_symbols_and_calls() {
        let source = r#"
class UserService:
    def get_user(self, user_id):
        return self.fetch(user_id)

    def fetch(self, user_id):
        pass

def handler():
    svc = UserService()
    svc.get_user(1)
"#;
        let facts = extract(source, "app/service.py");
        let quals: Vec<&str> = facts.symbols.iter().map(|s| s.qualname.as_str()).collect();
        assert_eq!(
            quals,
            vec![
                "UserService",
                "UserService.get_user",
                "UserService.fetch",
                "handler"
            ]
        );
        assert!(facts.calls.iter().any(|c| {
            c.caller == "UserService.get_user" && c.reference == "UserService.fetch"
        }));
        assert!(
            facts
                .calls
                .iter()
                .any(|c| c.caller == "handler" && c.reference == "UserService")
        );
    }

    #[test]
    fn fastapi_route_and_depends() {
        let source = r#"
from fastapi import APIRouter, Depends
router = APIRouter()

@router.get("/users/{user_id}", dependencies=[Depends(require_auth)])
def get_user(user_id: int, svc = Depends(get_service)):
    pass
"#;
        let facts = extract(source, "app/api.py");
        let route = &facts.routes[0];
        assert_eq!(route.method, "GET");
        assert_eq!(route.path, "/users/:user_id");
        assert_eq!(route.handler, "get_user");
        assert_eq!(route.middleware, vec!["require_auth".to_string()]);
        assert_eq!(facts.symbols[0].kind, SymbolKind::RouteHandler);
        assert!(facts.di.iter().any(|d| {
            d.provider == "get_service"
                && d.consumer == "get_user"
                && d.scope == BindingScope::RequestScoped
        }));
    }

    #[test]
    fn flask_route_methods_keyword() {
        let source = r#"
@app.route("/items", methods=["GET", "POST"])
def items():
    pass
"#;
        let facts = extract(source, "app/views.py");
        let methods: Vec<&str> = facts.routes.iter().map(|r| r.method.as_str()).collect();
        assert_eq!(methods, vec!["GET", "POST"]);
        assert!(facts.routes.iter().all(|r| r.path == "/items"));
    }

    #[test]
    fn django_urlpatterns() {
        let source = r#"
from django.urls import path
from app import views

urlpatterns = [
    path("users/<int:pk>/", views.detail),
]
"#;
        let facts = extract(source, "app/urls.py");
        let route = &facts.routes[0];
        assert_eq!(route.method, "ANY");
        assert_eq!(route.path, "/users/:pk");
        assert_eq!(route.handler, "views.detail");
        assert_eq!(route.framework, Framework::Django);
    }

    #[test]
    fn celery_and_scheduler_jobs() {
        let source = r#"
@app.task(name="emails.send_welcome")
def send_welcome(user_id):
    pass

@scheduler.scheduled_job("cron", hour=3, id="nightly-cleanup")
def cleanup():
    pass

@shared_task
def reindex():
    pass
"#;
        let facts = extract(source, "app/tasks.py");
        assert_eq!(facts.jobs.len(), 3);
        assert_eq!(facts.jobs[0].name, "emails.send_welcome");
        assert_eq!(
            facts.jobs[0].trigger,
            TriggerSpec::Event {
                name: "emails.send_welcome".to_string()
            }
        );
        assert_eq!(facts.jobs[1].name, "nightly-cleanup");
        assert_eq!(
            facts.jobs[1].trigger,
            TriggerSpec::Cron {
                expr: "cron hour=3".to_string()
            }
        );
        assert_eq!(facts.jobs[2].handler, "reindex");
    }

    #[test]
    fn import_bindings_with_aliases() {
        let source = r#"
import os
import app.services as services
from app.repo import UserRepo, save as persist
from . import sibling
from ..pkg import helper
"#;
        let facts = extract(source, "app/inner/mod.py");
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
        assert!(triples.contains(&("os", None, Some("os"))));
        assert!(triples.contains(&("app.services", None, Some("services"))));
        assert!(triples.contains(&("app.repo", Some("UserRepo"), Some("UserRepo"))));
        assert!(triples.contains(&("app.repo", Some("save"), Some("persist"))));
        assert!(triples.contains(&("app.inner", Some("sibling"), Some("sibling"))));
        assert!(triples.contains(&("app.pkg", Some("helper"), Some("helper"))));
    }

    #[test]
    fn underscore_names_are_private() {
        let source = r#"
def _internal():
    pass

def public():
    pass
"#;
        let facts = extract(source, "m.py");
        assert!(!facts.symbols[0].exported);
        assert!(facts.symbols[1].exported);
    }

    #[test]
    fn syntax_error_marks_parse_failure() {
        let facts = extract("def broken(:\n", "bad.py");
        assert!(facts.parse_failed);
        assert!(facts.symbols.is_empty());
    }
}
