//! JavaScript sources of the runtime helpers
//!
//! Every entry is a single top-level declaration. References between helpers
//! are discovered from the source text, so a helper only has to mention
//! another helper by name to pull it in.

pub(crate) const SOURCES: &[(&str, &str)] = &[
    (
        "_await",
        r#"function _await(value, then, direct) {
	if (direct) {
		return then ? then(value) : value;
	}
	if (!value || !value.then) {
		value = Promise.resolve(value);
	}
	return then ? value.then(then) : value;
}"#,
    ),
    ("_empty", "function _empty() {\n}"),
    (
        "_call",
        r#"function _call(body, then, direct) {
	if (direct) {
		return then ? then(body()) : body();
	}
	try {
		var result = Promise.resolve(body());
		return then ? result.then(then) : result;
	} catch (e) {
		return Promise.reject(e);
	}
}"#,
    ),
    (
        "_async",
        r#"function _async(f) {
	return function () {
		for (var args = [], i = 0; i < arguments.length; i++) {
			args[i] = arguments[i];
		}
		try {
			return Promise.resolve(f.apply(this, args));
		} catch (e) {
			return Promise.reject(e);
		}
	};
}"#,
    ),
    (
        "_invoke",
        r#"function _invoke(body, then) {
	var result = body();
	if (result && result.then) {
		return result.then(then);
	}
	return then(result);
}"#,
    ),
    (
        "_continue",
        r#"function _continue(value, then) {
	return value && value.then ? value.then(then) : then(value);
}"#,
    ),
    (
        "_catch",
        r#"function _catch(body, recover) {
	try {
		var result = body();
	} catch (e) {
		return recover(e);
	}
	if (result && result.then) {
		return result.then(void 0, recover);
	}
	return result;
}"#,
    ),
    (
        "_finally",
        r#"function _finally(body, finalizer) {
	try {
		var result = body();
	} catch (e) {
		return finalizer();
	}
	if (result && result.then) {
		return result.then(finalizer, finalizer);
	}
	return finalizer();
}"#,
    ),
    (
        "_finallyRethrows",
        r#"function _finallyRethrows(body, finalizer) {
	try {
		var result = body();
	} catch (e) {
		return finalizer(true, e);
	}
	if (result && result.then) {
		return result.then(finalizer.bind(null, false), finalizer.bind(null, true));
	}
	return finalizer(false, result);
}"#,
    ),
    (
        "_for",
        r#"function _for(test, update, body, check) {
	var result;
	function run(stage, value) {
		for (;;) {
			if (value && value.then) {
				return value.then(function (resolved) {
					return run(stage, resolved);
				});
			}
			if (stage === 0) {
				if (check && check()) {
					return result;
				}
				stage = 1;
				value = test ? test() : true;
			} else if (stage === 1) {
				if (!value) {
					return;
				}
				stage = 2;
				value = body();
			} else {
				result = value;
				if (check && check()) {
					return result;
				}
				stage = 0;
				value = update ? update() : void 0;
			}
		}
	}
	return run(0);
}"#,
    ),
    (
        "_do",
        r#"function _do(body, test, check) {
	var result;
	function run(stage, value) {
		for (;;) {
			if (value && value.then) {
				return value.then(function (resolved) {
					return run(stage, resolved);
				});
			}
			if (stage === 0) {
				stage = 1;
				value = body();
			} else if (stage === 1) {
				result = value;
				if (check && check()) {
					return result;
				}
				stage = 2;
				value = test();
			} else {
				if (!value) {
					return;
				}
				stage = 0;
				value = void 0;
			}
		}
	}
	return run(0);
}"#,
    ),
    (
        "_forTo",
        r#"function _forTo(array, body, check) {
	var i = 0, result;
	function run(waiting, value) {
		for (;;) {
			if (waiting) {
				if (value && value.then) {
					return value.then(function (resolved) {
						return run(true, resolved);
					});
				}
				result = value;
				if (check && check()) {
					return result;
				}
			}
			if (i >= array.length) {
				return;
			}
			value = body(i++);
			waiting = true;
		}
	}
	return run(false);
}"#,
    ),
    (
        "_forIn",
        r#"function _forIn(target, body, check) {
	var keys = [];
	for (var key in target) {
		keys.push(key);
	}
	return _forTo(keys, function (i) {
		return body(keys[i]);
	}, check);
}"#,
    ),
    (
        "_forOf",
        r#"function _forOf(target, body, check) {
	if (Array.isArray(target)) {
		return _forTo(target, function (i) {
			return body(target[i]);
		}, check);
	}
	var iterator = target[Symbol.iterator](), result;
	function close() {
		if (iterator.return) {
			iterator.return();
		}
	}
	function run(waiting, value) {
		try {
			for (;;) {
				if (waiting) {
					if (value && value.then) {
						return value.then(function (resolved) {
							return run(true, resolved);
						}, function (error) {
							close();
							throw error;
						});
					}
					result = value;
					if (check && check()) {
						close();
						return result;
					}
				}
				var step = iterator.next();
				if (step.done) {
					return;
				}
				value = body(step.value);
				waiting = true;
			}
		} catch (e) {
			close();
			throw e;
		}
	}
	return run(false);
}"#,
    ),
    (
        "_forAwaitOf",
        r#"function _forAwaitOf(target, body, check) {
	var method = typeof Symbol !== "undefined" && Symbol.asyncIterator ? target[Symbol.asyncIterator] : void 0;
	var iterator = method ? method.call(target) : target[Symbol.iterator](), result;
	function close() {
		return iterator.return ? iterator.return() : void 0;
	}
	function next() {
		return Promise.resolve(iterator.next()).then(function (step) {
			if (step.done) {
				return;
			}
			return Promise.resolve(step.value).then(function (value) {
				return new Promise(function (resolve) {
					resolve(body(value));
				});
			}).then(function (value) {
				result = value;
				if (check && check()) {
					return Promise.resolve(close()).then(function () {
						return result;
					});
				}
				return next();
			}, function (error) {
				return Promise.resolve(close()).then(function () {
					throw error;
				});
			});
		});
	}
	return next();
}"#,
    ),
    (
        "_switch",
        r#"function _switch(discriminant, cases) {
	var fallback = -1;
	function fallsThrough(i) {
		var fallthrough = cases[i][2];
		return typeof fallthrough === "function" ? fallthrough() : !!fallthrough;
	}
	function run(i) {
		for (; i < cases.length; i++) {
			var body = cases[i][1];
			var result = body ? body() : void 0;
			if (result && result.then) {
				return result.then(function (value) {
					return fallsThrough(i) ? run(i + 1) : value;
				});
			}
			if (!fallsThrough(i)) {
				return result;
			}
		}
	}
	function match(i) {
		for (; i < cases.length; i++) {
			var test = cases[i][0];
			if (!test) {
				fallback = i;
				continue;
			}
			var value = test();
			if (value && value.then) {
				return value.then(function (resolved) {
					return resolved === discriminant ? run(i) : match(i + 1);
				});
			}
			if (value === discriminant) {
				return run(i);
			}
		}
		if (fallback !== -1) {
			return run(fallback);
		}
	}
	return match(0);
}"#,
    ),
    (
        "_AsyncGenerator",
        r#"var _AsyncGenerator = /*#__PURE__*/function () {
	function _AsyncGenerator(entry) {
		this._entry = entry;
		this._queue = [];
		this._resume = null;
		this._running = false;
		this._started = false;
		this._done = false;
		this._stop = null;
	}
	_AsyncGenerator.prototype._request = function (method, value) {
		var generator = this;
		return new Promise(function (resolve, reject) {
			generator._queue.push({ method: method, value: value, resolve: resolve, reject: reject });
			generator._drain();
		});
	};
	_AsyncGenerator.prototype._settle = function (request) {
		if (request.method === "throw") {
			request.reject(request.value);
		} else {
			request.resolve({ value: request.method === "return" ? request.value : void 0, done: true });
		}
	};
	_AsyncGenerator.prototype._drain = function () {
		while (!this._running && this._queue.length) {
			var request = this._queue[0];
			if (this._done || (!this._started && request.method !== "next")) {
				this._done = true;
				this._queue.shift();
				this._settle(request);
				continue;
			}
			this._running = true;
			if (this._resume) {
				var resume = this._resume;
				this._resume = null;
				resume(request);
				return;
			}
			this._started = true;
			var generator = this;
			new Promise(function (resolve) {
				resolve(generator._entry(generator));
			}).then(function (value) {
				generator._finish(false, value);
			}, function (error) {
				if (error && error === generator._stop) {
					generator._finish(false, error.value);
				} else {
					generator._finish(true, error);
				}
			});
			return;
		}
	};
	_AsyncGenerator.prototype._finish = function (failed, value) {
		this._done = true;
		this._running = false;
		var request = this._queue.shift();
		if (request) {
			if (failed) {
				request.reject(value);
			} else {
				request.resolve({ value: value, done: true });
			}
		}
		this._drain();
	};
	_AsyncGenerator.prototype._yield = function (value) {
		var generator = this;
		var request = this._queue.shift();
		request.resolve({ value: value, done: false });
		return new Promise(function (resolve, reject) {
			generator._resume = function (next) {
				if (next.method === "throw") {
					reject(next.value);
				} else if (next.method === "return") {
					generator._stop = { value: next.value };
					reject(generator._stop);
				} else {
					resolve(next.value);
				}
			};
			generator._running = false;
			generator._drain();
		});
	};
	_AsyncGenerator.prototype.next = function (value) {
		return this._request("next", value);
	};
	_AsyncGenerator.prototype.return = function (value) {
		return this._request("return", value);
	};
	_AsyncGenerator.prototype.throw = function (error) {
		return this._request("throw", error);
	};
	if (typeof Symbol !== "undefined" && Symbol.asyncIterator) {
		_AsyncGenerator.prototype[Symbol.asyncIterator] = function () {
			return this;
		};
	}
	return _AsyncGenerator;
}();"#,
    ),
];
