use oxc_ast::ast::{
    Argument, ArrayExpressionElement, AssignmentTarget, Expression, ObjectPropertyKind, PropertyKey as OxcPropertyKey,
    PropertyKind,
};
use oxc_span::GetSpan;

use super::Lowerer;
use crate::ast::opaque_store::OpaqueNode;
use crate::ast::scan;
use crate::error::Result;
use crate::ir::{Arg, ArrayItem, Expr, MemberProp, ObjectEntry, PropertyKey, Target};

impl<'a> Lowerer<'a, '_> {
    /// Lower `expr`, keeping only the spine that leads to a suspension point
    pub(crate) fn lower_expression(&mut self, expr: Expression<'a>) -> Result<Expr> {
        match &expr {
            Expression::Identifier(ident) => return Ok(Expr::Ident(ident.name.to_string())),
            Expression::BooleanLiteral(literal) => return Ok(Expr::Bool(literal.value)),
            Expression::NullLiteral(_) => return Ok(Expr::Null),
            Expression::NumericLiteral(literal) => return Ok(Expr::Number(literal.value)),
            Expression::StringLiteral(literal) => return Ok(Expr::Str(literal.value.to_string())),
            Expression::ThisExpression(_) => return Ok(Expr::This),
            // only reached as the object of a member on a suspending path
            Expression::Super(it) => return Err(self.unsupported("super property access", it.span)),
            _ => {}
        }
        if !self.suspends(&expr) {
            return Ok(self.park_expr(expr));
        }

        let span = expr.span();
        Ok(match expr {
            Expression::AwaitExpression(it) => Expr::Await(Box::new(self.lower_expression(it.unbox().argument)?)),
            Expression::YieldExpression(it) => {
                let it = it.unbox();
                if it.delegate {
                    return Err(self.unsupported("yield*", span));
                }
                match it.argument {
                    Some(argument) => Expr::Yield(Some(Box::new(self.lower_expression(argument)?))),
                    None => Expr::Yield(None),
                }
            }
            Expression::ParenthesizedExpression(it) => self.lower_expression(it.unbox().expression)?,
            Expression::UnaryExpression(it) => {
                let it = it.unbox();
                Expr::Unary(it.operator, Box::new(self.lower_expression(it.argument)?))
            }
            Expression::BinaryExpression(it) => {
                let it = it.unbox();
                let left = self.lower_expression(it.left)?;
                let right = self.lower_expression(it.right)?;
                Expr::Binary(it.operator, Box::new(left), Box::new(right))
            }
            Expression::LogicalExpression(it) => {
                let it = it.unbox();
                let left = self.lower_expression(it.left)?;
                let right = self.lower_expression(it.right)?;
                Expr::Logical(it.operator, Box::new(left), Box::new(right))
            }
            Expression::ConditionalExpression(it) => {
                let it = it.unbox();
                let test = self.lower_expression(it.test)?;
                let consequent = self.lower_expression(it.consequent)?;
                let alternate = self.lower_expression(it.alternate)?;
                Expr::Conditional(Box::new(test), Box::new(consequent), Box::new(alternate))
            }
            Expression::AssignmentExpression(it) => {
                let it = it.unbox();
                let target = self.lower_target(it.left)?;
                let value = self.lower_expression(it.right)?;
                Expr::Assign(it.operator, Box::new(target), Box::new(value))
            }
            Expression::CallExpression(it) => {
                let it = it.unbox();
                if it.optional {
                    return Err(self.unsupported("optional call", span));
                }
                if matches!(it.callee, Expression::Super(_)) {
                    return Err(self.unsupported("super call", span));
                }
                let callee = self.lower_callee(it.callee)?;
                let mut args = Vec::with_capacity(it.arguments.len());
                for argument in it.arguments {
                    args.push(self.lower_argument(argument)?);
                }
                Expr::Call(Box::new(callee), args)
            }
            Expression::NewExpression(it) => {
                let it = it.unbox();
                let callee = self.lower_expression(it.callee)?;
                let mut args = Vec::with_capacity(it.arguments.len());
                for argument in it.arguments {
                    args.push(self.lower_argument(argument)?);
                }
                Expr::New(Box::new(callee), args)
            }
            Expression::StaticMemberExpression(it) => {
                let it = it.unbox();
                if it.optional {
                    return Err(self.unsupported("optional member access", span));
                }
                let object = self.lower_expression(it.object)?;
                Expr::Member(Box::new(object), MemberProp::Static(it.property.name.to_string()))
            }
            Expression::ComputedMemberExpression(it) => {
                let it = it.unbox();
                if it.optional {
                    return Err(self.unsupported("optional member access", span));
                }
                let object = self.lower_expression(it.object)?;
                let property = self.lower_expression(it.expression)?;
                Expr::Member(Box::new(object), MemberProp::Computed(Box::new(property)))
            }
            Expression::SequenceExpression(it) => {
                let mut exprs = Vec::with_capacity(it.expressions.len());
                for expr in it.unbox().expressions {
                    exprs.push(self.lower_expression(expr)?);
                }
                Expr::Sequence(exprs)
            }
            Expression::ArrayExpression(it) => {
                let mut items = Vec::with_capacity(it.elements.len());
                for element in it.unbox().elements {
                    items.push(match element {
                        ArrayExpressionElement::SpreadElement(spread) => {
                            ArrayItem::Spread(self.lower_expression(spread.unbox().argument)?)
                        }
                        ArrayExpressionElement::Elision(_) => ArrayItem::Hole,
                        other => ArrayItem::Expr(self.lower_expression(other.into_expression())?),
                    });
                }
                Expr::Array(items)
            }
            Expression::ObjectExpression(it) => {
                let mut entries = Vec::with_capacity(it.properties.len());
                for property in it.unbox().properties {
                    entries.push(self.lower_property(property)?);
                }
                Expr::Object(entries)
            }
            other => return Err(self.unsupported(describe(&other), span)),
        })
    }

    /// A member callee keeps its receiver even when only the arguments suspend,
    /// so the call can be rebuilt as `object.method(...)`
    fn lower_callee(&mut self, callee: Expression<'a>) -> Result<Expr> {
        match callee {
            Expression::ParenthesizedExpression(it) => self.lower_callee(it.unbox().expression),
            Expression::StaticMemberExpression(it) if !it.optional => {
                let it = it.unbox();
                let object = self.lower_expression(it.object)?;
                Ok(Expr::Member(Box::new(object), MemberProp::Static(it.property.name.to_string())))
            }
            Expression::ComputedMemberExpression(it) if !it.optional => {
                let it = it.unbox();
                let object = self.lower_expression(it.object)?;
                let property = self.lower_expression(it.expression)?;
                Ok(Expr::Member(Box::new(object), MemberProp::Computed(Box::new(property))))
            }
            other => self.lower_expression(other),
        }
    }

    fn lower_argument(&mut self, argument: Argument<'a>) -> Result<Arg> {
        Ok(match argument {
            Argument::SpreadElement(spread) => Arg::Spread(self.lower_expression(spread.unbox().argument)?),
            other => Arg::Expr(self.lower_expression(other.into_expression())?),
        })
    }

    fn lower_property(&mut self, property: ObjectPropertyKind<'a>) -> Result<ObjectEntry> {
        let property = match property {
            ObjectPropertyKind::SpreadProperty(spread) => {
                return Ok(ObjectEntry::Spread(self.lower_expression(spread.unbox().argument)?));
            }
            ObjectPropertyKind::ObjectProperty(property) if property.kind != PropertyKind::Init || property.method => {
                let property = ObjectPropertyKind::ObjectProperty(property);
                if scan::property_suspends(&property, self.generator) {
                    return Err(self.unsupported("computed method key", property.span()));
                }
                return Ok(ObjectEntry::Opaque(self.store.park(OpaqueNode::Property(property))));
            }
            ObjectPropertyKind::ObjectProperty(property) => property.unbox(),
        };
        let key = if property.computed {
            PropertyKey::Computed(self.lower_expression(property.key.into_expression())?)
        } else {
            match property.key {
                OxcPropertyKey::StaticIdentifier(ident) => PropertyKey::Static(ident.name.to_string()),
                other => PropertyKey::Opaque(self.store.park(OpaqueNode::Key(other))),
            }
        };
        Ok(ObjectEntry::Property {
            key,
            value: self.lower_expression(property.value)?,
        })
    }

    pub(crate) fn lower_target(&mut self, target: AssignmentTarget<'a>) -> Result<Target> {
        Ok(match target {
            AssignmentTarget::AssignmentTargetIdentifier(ident) => Target::Ident(ident.name.to_string()),
            AssignmentTarget::StaticMemberExpression(member) => {
                let member = member.unbox();
                let object = self.lower_expression(member.object)?;
                Target::Member(object, MemberProp::Static(member.property.name.to_string()))
            }
            AssignmentTarget::ComputedMemberExpression(member) => {
                let member = member.unbox();
                let object = self.lower_expression(member.object)?;
                let property = self.lower_expression(member.expression)?;
                Target::Member(object, MemberProp::Computed(Box::new(property)))
            }
            other => {
                if scan::target_suspends(&other, self.generator) {
                    return Err(self.unsupported("destructuring assignment", other.span()));
                }
                Target::Opaque(self.store.park(OpaqueNode::Target(other)))
            }
        })
    }
}

fn describe(expr: &Expression<'_>) -> &'static str {
    match expr {
        Expression::TemplateLiteral(_) => "template literal",
        Expression::TaggedTemplateExpression(_) => "tagged template",
        Expression::ChainExpression(_) => "optional chain",
        Expression::ClassExpression(_) => "class expression",
        Expression::PrivateFieldExpression(_) => "private field access",
        Expression::ImportExpression(_) => "dynamic import",
        Expression::UpdateExpression(_) => "update expression",
        _ => "expression",
    }
}
